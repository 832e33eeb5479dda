//! Behavior traits: the three ways an interceptor can sit around a handler.
//!
//! - [`PipelineBehavior`]: bound to one request type, strongly typed end to end.
//! - [`GlobalBehavior`]: one instance serves every request type and sees the
//!   request as an opaque value plus a [`RequestContext`].
//! - [`OpenBehavior`]: a template closed over concrete request types, after
//!   which each closed instance behaves like a `PipelineBehavior`.

use std::any::Any;

use async_trait::async_trait;
use courier_core::{PipelineConfig, RequestContext, TypeKey};
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::executor::{ErasedNext, Next};
use crate::request::Request;

/// Type-erased response passed through global behaviors.
pub type AnyResponse = Box<dyn Any + Send>;

/// A behavior bound to request type `R`.
///
/// Calling `next.run()` continues the chain; returning without calling it
/// short-circuits every later behavior and the handler. `next` is consumed by
/// `run`, so it can be invoked at most once.
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync + 'static {
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError>;
}

/// A behavior applied to every request type.
///
/// The value returned must be a boxed `ctx.response_type`; anything else
/// fails the dispatch with `DispatchError::ResponseTypeMismatch`.
#[async_trait]
pub trait GlobalBehavior: Send + Sync + 'static {
    async fn handle(
        &self,
        request: &(dyn Any + Send + Sync),
        ctx: &RequestContext,
        next: ErasedNext<'_>,
        cancel: &CancellationToken,
    ) -> Result<AnyResponse, DispatchError>;
}

/// A behavior template that can be closed over any request type.
///
/// The template instance comes from the service resolver; [`close`](Self::close)
/// produces the behavior for one concrete request type.
///
/// ```rust,ignore
/// struct Timing;
///
/// impl OpenBehavior for Timing {
///     type Closed<R: Request> = TimingBehavior<R>;
///
///     fn close<R: Request>(&self) -> TimingBehavior<R> {
///         TimingBehavior::new()
///     }
/// }
/// ```
pub trait OpenBehavior: Send + Sync + 'static {
    type Closed<R: Request>: PipelineBehavior<R>;

    fn close<R: Request>(&self) -> Self::Closed<R>;
}

/// Compile-time checked exclusion helpers for `PipelineConfig`.
pub trait PipelineConfigExt {
    /// Excludes the typed behavior `B` registered for request `R`.
    #[must_use]
    fn exclude_typed<B, R>(&self) -> Self
    where
        B: PipelineBehavior<R>,
        R: Request;

    /// Excludes the open-generic template `T` for every request type.
    #[must_use]
    fn exclude_template<T: OpenBehavior>(&self) -> Self;
}

impl PipelineConfigExt for PipelineConfig {
    fn exclude_typed<B, R>(&self) -> Self
    where
        B: PipelineBehavior<R>,
        R: Request,
    {
        self.exclude_concrete_key(TypeKey::of::<B>())
    }

    fn exclude_template<T: OpenBehavior>(&self) -> Self {
        self.exclude_concrete_key(TypeKey::of::<T>())
    }
}
