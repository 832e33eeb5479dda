//! `tower::Service` adapter over [`Mediator`].

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use courier_core::PipelineConfig;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::error::DispatchError;
use crate::mediator::Mediator;
use crate::request::Request;

// ---------------------------------------------------------------------------
// RequestService
// ---------------------------------------------------------------------------

/// Dispatches requests of type `R` through a shared mediator with a fixed
/// pipeline configuration. Always ready.
pub struct RequestService<R> {
    mediator: Arc<Mediator>,
    config: PipelineConfig,
    _request: PhantomData<fn(R)>,
}

impl<R: Request> RequestService<R> {
    /// Uses the mediator's default pipeline.
    #[must_use]
    pub fn new(mediator: Arc<Mediator>) -> Self {
        let config = mediator.default_pipeline().clone();
        Self::with_config(mediator, config)
    }

    #[must_use]
    pub fn with_config(mediator: Arc<Mediator>, config: PipelineConfig) -> Self {
        Self {
            mediator,
            config,
            _request: PhantomData,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl<R> Clone for RequestService<R> {
    fn clone(&self) -> Self {
        Self {
            mediator: Arc::clone(&self.mediator),
            config: self.config.clone(),
            _request: PhantomData,
        }
    }
}

impl<R: Request> Service<R> for RequestService<R> {
    type Response = R::Response;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<R::Response, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let mediator = Arc::clone(&self.mediator);
        let config = self.config.clone();
        Box::pin(async move {
            mediator
                .send_with(request, &config, CancellationToken::new())
                .await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
