//! The dispatcher: routes a request to its handler through the selected
//! behavior chain.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use courier_core::{
    BehaviorRegistry, GroupKey, Lifetime, PipelineConfig, RegistryBuilder, RequestContext, TypeKey,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, warn, Instrument};

use crate::behavior::AnyResponse;
use crate::config::MediatorConfig;
use crate::error::DispatchError;
use crate::executor::Chain;
use crate::handler::HandlerBinding;
use crate::record::BehaviorRecord;
use crate::request::{Request, RequestHandler};
use crate::resolver::ServiceResolver;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Handler table
// ---------------------------------------------------------------------------

/// Type-erased entry point used by `send_any`.
trait ErasedRoute: Send + Sync {
    fn dispatch<'a>(
        &'a self,
        mediator: &'a Mediator,
        request: Box<dyn Any + Send>,
        config: &'a PipelineConfig,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AnyResponse, DispatchError>>;
}

struct Route<R>(PhantomData<fn() -> R>);

impl<R: Request> ErasedRoute for Route<R> {
    fn dispatch<'a>(
        &'a self,
        mediator: &'a Mediator,
        request: Box<dyn Any + Send>,
        config: &'a PipelineConfig,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AnyResponse, DispatchError>> {
        Box::pin(async move {
            let request = request
                .downcast::<R>()
                .map_err(|_| DispatchError::InvalidRequest)?;
            let response = mediator.send_with(*request, config, cancel).await?;
            Ok(Box::new(response) as AnyResponse)
        })
    }
}

struct HandlerEntry {
    handler: TypeKey,
    /// Holds a `HandlerBinding<R>` for the entry's request type.
    binding: Box<dyn Any + Send + Sync>,
    route: Box<dyn ErasedRoute>,
}

// ---------------------------------------------------------------------------
// MediatorBuilder
// ---------------------------------------------------------------------------

/// Collects handler bindings and behavior records, then freezes them into a
/// [`Mediator`].
pub struct MediatorBuilder {
    resolver: Arc<dyn ServiceResolver>,
    behaviors: RegistryBuilder<BehaviorRecord>,
    handlers: HashMap<TypeId, HandlerEntry>,
    config: MediatorConfig,
}

impl MediatorBuilder {
    /// Binds `H` as the handler for request type `R`.
    ///
    /// Each request type has exactly one handler; a second binding for the
    /// same request type is ignored and logged.
    #[must_use]
    pub fn handler<R, H>(mut self, lifetime: Lifetime) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        let request = TypeKey::of::<R>();
        let handler = TypeKey::of::<H>();
        match self.handlers.entry(request.id()) {
            Entry::Occupied(existing) => {
                warn!(
                    request = request.name(),
                    kept = existing.get().handler.name(),
                    ignored = handler.name(),
                    "duplicate handler registration ignored"
                );
            }
            Entry::Vacant(slot) => {
                debug!(request = request.name(), handler = handler.name(), "handler registered");
                slot.insert(HandlerEntry {
                    handler,
                    binding: Box::new(HandlerBinding::<R>::new::<H>(lifetime)),
                    route: Box::new(Route::<R>(PhantomData)),
                });
            }
        }
        self
    }

    /// Registers a behavior record. Duplicates (same identity and scope) are
    /// dropped; the first registration wins.
    #[must_use]
    pub fn behavior(mut self, record: impl Into<BehaviorRecord>) -> Self {
        self.behaviors.register(record.into());
        self
    }

    /// Registers every record produced by a discovery step.
    #[must_use]
    pub fn behaviors<I>(self, records: I) -> Self
    where
        I: IntoIterator<Item = BehaviorRecord>,
    {
        records.into_iter().fold(self, MediatorBuilder::behavior)
    }

    #[must_use]
    pub fn config(mut self, config: MediatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Finalizes the behavior registry and produces the mediator.
    #[must_use]
    pub fn build(self) -> Mediator {
        let default_pipeline = self.config.default_pipeline();
        Mediator {
            registry: self.behaviors.finalize(),
            handlers: self.handlers,
            resolver: self.resolver,
            config: self.config,
            default_pipeline,
        }
    }
}

// ---------------------------------------------------------------------------
// Mediator
// ---------------------------------------------------------------------------

/// Routes each request to its single handler, running the applicable
/// behaviors around it.
///
/// A `Mediator` is immutable once built and can be shared freely across
/// tasks (typically behind an `Arc`).
pub struct Mediator {
    registry: BehaviorRegistry<BehaviorRecord>,
    handlers: HashMap<TypeId, HandlerEntry>,
    resolver: Arc<dyn ServiceResolver>,
    config: MediatorConfig,
    default_pipeline: PipelineConfig,
}

impl Mediator {
    #[must_use]
    pub fn builder(resolver: Arc<dyn ServiceResolver>) -> MediatorBuilder {
        MediatorBuilder {
            resolver,
            behaviors: RegistryBuilder::new(),
            handlers: HashMap::new(),
            config: MediatorConfig::default(),
        }
    }

    /// Dispatches `request` with the default pipeline.
    ///
    /// # Errors
    ///
    /// See [`send_with`](Self::send_with).
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response, DispatchError> {
        self.send_with(request, &self.default_pipeline, CancellationToken::new())
            .await
    }

    /// Dispatches `request` with an explicit pipeline configuration and
    /// cancellation signal.
    ///
    /// `skip_all` bypasses selection entirely. When no behavior is selected
    /// the handler is called directly without building a chain.
    ///
    /// # Errors
    ///
    /// - `HandlerNotFound` when no handler is bound to `R`.
    /// - `Resolve` when a behavior or the handler cannot be resolved.
    /// - Whatever error a behavior or the handler returns, unchanged.
    pub async fn send_with<R: Request>(
        &self,
        request: R,
        config: &PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let request_type = TypeKey::of::<R>();
        let handler = self.binding::<R>()?;
        let span = debug_span!(
            "dispatch",
            request = request_type.short_name(),
            behaviors = tracing::field::Empty,
        );

        async move {
            if config.is_skip_all() {
                debug!("pipeline skipped");
                return handler
                    .invoke(self.resolver.as_ref(), &request, &cancel)
                    .await;
            }

            let behaviors = self.registry.select(request_type, config);
            tracing::Span::current().record("behaviors", behaviors.len());
            if behaviors.is_empty() {
                return handler
                    .invoke(self.resolver.as_ref(), &request, &cancel)
                    .await;
            }

            debug!(handler = handler.identity().short_name(), "running behavior chain");
            let chain = Chain {
                behaviors: &behaviors,
                handler,
                resolver: self.resolver.as_ref(),
                request: &request,
                context: RequestContext::new(request_type, TypeKey::of::<R::Response>()),
                cancel: &cancel,
            };
            chain.advance(0).await
        }
        .instrument(span)
        .await
    }

    /// Starts a chainable configuration from the default pipeline.
    #[must_use]
    pub fn pipeline(&self) -> ConfiguredSender<'_> {
        self.with(self.default_pipeline.clone())
    }

    /// Starts a chainable configuration from `config`.
    #[must_use]
    pub fn with(&self, config: PipelineConfig) -> ConfiguredSender<'_> {
        ConfiguredSender {
            mediator: self,
            config,
        }
    }

    /// Dispatches a request whose type is only known at runtime.
    ///
    /// `None` is rejected with `InvalidRequest` before any lookup.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for `None`, `UnknownRequestType` when the boxed value's
    /// type has no handler, otherwise as [`send_with`](Self::send_with).
    pub async fn send_any(
        &self,
        request: Option<Box<dyn Any + Send>>,
    ) -> Result<AnyResponse, DispatchError> {
        self.send_any_with(request, &self.default_pipeline, CancellationToken::new())
            .await
    }

    /// Type-erased counterpart of [`send_with`](Self::send_with).
    ///
    /// # Errors
    ///
    /// Same as [`send_any`](Self::send_any).
    pub async fn send_any_with(
        &self,
        request: Option<Box<dyn Any + Send>>,
        config: &PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<AnyResponse, DispatchError> {
        let request = request.ok_or(DispatchError::InvalidRequest)?;
        let type_id = (*request).type_id();
        let entry = self
            .handlers
            .get(&type_id)
            .ok_or(DispatchError::UnknownRequestType { type_id })?;
        entry.route.dispatch(self, request, config, cancel).await
    }

    #[must_use]
    pub fn has_handler<R: Request>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    #[must_use]
    pub fn registry(&self) -> &BehaviorRegistry<BehaviorRecord> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    #[must_use]
    pub fn default_pipeline(&self) -> &PipelineConfig {
        &self.default_pipeline
    }

    fn binding<R: Request>(&self) -> Result<&HandlerBinding<R>, DispatchError> {
        self.handlers
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.binding.downcast_ref::<HandlerBinding<R>>())
            .ok_or(DispatchError::HandlerNotFound {
                request: TypeKey::of::<R>(),
            })
    }
}

// ---------------------------------------------------------------------------
// ConfiguredSender
// ---------------------------------------------------------------------------

/// Chainable per-call configuration bound to a mediator.
///
/// ```rust,ignore
/// let user = mediator
///     .pipeline()
///     .with_group("admin")
///     .exclude_marker::<dyn Caching>()
///     .send(GetUser { id: 7 })
///     .await?;
/// ```
#[derive(Clone)]
pub struct ConfiguredSender<'m> {
    mediator: &'m Mediator,
    config: PipelineConfig,
}

impl<'m> ConfiguredSender<'m> {
    #[must_use]
    pub fn skip_all(self) -> Self {
        self.map(PipelineConfig::skip_all)
    }

    #[must_use]
    pub fn with_group(self, group: impl Into<GroupKey>) -> Self {
        let group = group.into();
        self.map(|c| c.with_group(group))
    }

    #[must_use]
    pub fn exclude_marker<M: ?Sized + 'static>(self) -> Self {
        self.map(PipelineConfig::exclude_marker::<M>)
    }

    #[must_use]
    pub fn exclude_concrete<T: ?Sized + 'static>(self) -> Self {
        self.map(PipelineConfig::exclude_concrete::<T>)
    }

    #[must_use]
    pub fn skip_global(self, skip: bool) -> Self {
        self.map(|c| c.skip_global(skip))
    }

    #[must_use]
    pub fn only_groups(self, only: bool) -> Self {
        self.map(|c| c.only_groups(only))
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// # Errors
    ///
    /// See [`Mediator::send_with`].
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response, DispatchError> {
        self.send_cancellable(request, CancellationToken::new()).await
    }

    /// # Errors
    ///
    /// See [`Mediator::send_with`].
    pub async fn send_cancellable<R: Request>(
        &self,
        request: R,
        cancel: CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        self.mediator.send_with(request, &self.config, cancel).await
    }

    fn map(self, f: impl FnOnce(&PipelineConfig) -> PipelineConfig) -> Self {
        Self {
            config: f(&self.config),
            mediator: self.mediator,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
