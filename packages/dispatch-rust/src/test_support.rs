//! Shared fixtures for unit tests: requests, handlers, and behaviors that
//! record what they did into an [`EventLog`].

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::RequestContext;
use tokio_util::sync::CancellationToken;

use crate::behavior::{AnyResponse, GlobalBehavior, OpenBehavior, PipelineBehavior};
use crate::error::DispatchError;
use crate::executor::{ErasedNext, Next};
use crate::request::{Request, RequestHandler};

/// Ordered, shared log of pipeline events. Owned by each test.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Arc<parking_lot::Mutex<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Installs a test-writer subscriber honoring `RUST_LOG`. Safe to call from
/// every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Marker used for exclusion tests.
pub(crate) trait Stamp {}

// -- requests ---------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct Ping {
    pub(crate) text: String,
}

impl Ping {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Request for Ping {
    type Response = String;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Tally {
    pub(crate) amount: u32,
}

impl Request for Tally {
    type Response = u32;
}

// -- handlers ---------------------------------------------------------------

pub(crate) struct PingHandler {
    log: EventLog,
}

impl PingHandler {
    pub(crate) fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl RequestHandler<Ping> for PingHandler {
    async fn handle(
        &self,
        request: &Ping,
        _cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        self.log.push("handler");
        Ok(format!("pong:{}", request.text))
    }
}

pub(crate) struct TallyHandler {
    log: EventLog,
}

impl TallyHandler {
    pub(crate) fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl RequestHandler<Tally> for TallyHandler {
    async fn handle(
        &self,
        request: &Tally,
        _cancel: &CancellationToken,
    ) -> Result<u32, DispatchError> {
        self.log.push("tally-handler");
        Ok(request.amount * 2)
    }
}

// -- behaviors --------------------------------------------------------------

/// Logs `before:N`, `after:N`, or `error:N` around its continuation.
pub(crate) struct Recorder<const N: usize> {
    log: EventLog,
}

impl<const N: usize> Recorder<N> {
    pub(crate) fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl<R: Request, const N: usize> PipelineBehavior<R> for Recorder<N> {
    async fn handle(
        &self,
        _request: &R,
        next: Next<'_, R>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        self.log.push(format!("before:{N}"));
        match next.run().await {
            Ok(response) => {
                self.log.push(format!("after:{N}"));
                Ok(response)
            }
            Err(err) => {
                self.log.push(format!("error:{N}"));
                Err(err)
            }
        }
    }
}

/// Passes straight through.
#[derive(Default)]
pub(crate) struct Noop;

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Noop {
    async fn handle(
        &self,
        _request: &R,
        next: Next<'_, R>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        next.run().await
    }
}

/// Answers `Ping` itself without delegating.
#[derive(Default)]
pub(crate) struct ShortCircuit;

#[async_trait]
impl PipelineBehavior<Ping> for ShortCircuit {
    async fn handle(
        &self,
        _request: &Ping,
        _next: Next<'_, Ping>,
        _cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        Ok("short-circuit".to_string())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("step failed")]
pub(crate) struct Fail;

/// Fails without delegating.
#[derive(Default)]
pub(crate) struct FailingStep;

#[async_trait]
impl<R: Request> PipelineBehavior<R> for FailingStep {
    async fn handle(
        &self,
        _request: &R,
        _next: Next<'_, R>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        Err(anyhow::Error::new(Fail).into())
    }
}

/// Global behavior logging the request/response types it saw.
pub(crate) struct Tagged {
    log: EventLog,
}

impl Tagged {
    pub(crate) fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl GlobalBehavior for Tagged {
    async fn handle(
        &self,
        _request: &(dyn Any + Send + Sync),
        ctx: &RequestContext,
        next: ErasedNext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<AnyResponse, DispatchError> {
        self.log.push(format!(
            "global:{}->{}",
            ctx.request_type.short_name(),
            ctx.response_type.short_name()
        ));
        let response = next.run().await?;
        self.log.push("global-after");
        Ok(response)
    }
}

/// Global pass-through.
#[derive(Default)]
pub(crate) struct NoopGlobal;

#[async_trait]
impl GlobalBehavior for NoopGlobal {
    async fn handle(
        &self,
        _request: &(dyn Any + Send + Sync),
        _ctx: &RequestContext,
        next: ErasedNext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<AnyResponse, DispatchError> {
        next.run().await
    }
}

/// Global behavior that answers with a value of the wrong type.
#[derive(Default)]
pub(crate) struct WrongShape;

#[async_trait]
impl GlobalBehavior for WrongShape {
    async fn handle(
        &self,
        _request: &(dyn Any + Send + Sync),
        _ctx: &RequestContext,
        _next: ErasedNext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<AnyResponse, DispatchError> {
        Ok(Box::new(42_u64))
    }
}

/// Open-generic template; closed instances log `open:<Request>`.
#[derive(Default)]
pub(crate) struct Echo {
    log: EventLog,
}

impl Echo {
    pub(crate) fn new(log: EventLog) -> Self {
        Self { log }
    }
}

pub(crate) struct EchoBehavior<R> {
    log: EventLog,
    _request: PhantomData<fn() -> R>,
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for EchoBehavior<R> {
    async fn handle(
        &self,
        _request: &R,
        next: Next<'_, R>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let name = courier_core::TypeKey::of::<R>().short_name();
        self.log.push(format!("open:{name}"));
        next.run().await
    }
}

impl OpenBehavior for Echo {
    type Closed<R: Request> = EchoBehavior<R>;

    fn close<R: Request>(&self) -> EchoBehavior<R> {
        EchoBehavior {
            log: self.log.clone(),
            _request: PhantomData,
        }
    }
}
