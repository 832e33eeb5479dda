//! Timeout middleware for dispatch.
//!
//! Fails a dispatch that runs longer than the configured limit with
//! `DispatchError::Timeout`. The in-flight chain is dropped at that point.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};

use crate::error::DispatchError;

// ---------------------------------------------------------------------------
// DispatchTimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds each dispatch. `None` disables the limit.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTimeoutLayer {
    timeout: Option<Duration>,
}

impl DispatchTimeoutLayer {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for DispatchTimeoutLayer {
    type Service = DispatchTimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchTimeoutService {
            inner,
            timeout: self.timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchTimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces the dispatch timeout.
#[derive(Debug, Clone)]
pub struct DispatchTimeoutService<S> {
    inner: S,
    timeout: Option<Duration>,
}

impl<S, R> Service<R> for DispatchTimeoutService<S>
where
    S: Service<R, Error = DispatchError> + Send,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        let fut = self.inner.call(request);
        let Some(duration) = self.timeout else {
            return Box::pin(fut);
        };
        Box::pin(async move {
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let timeout_ms = duration.as_millis() as u64;
                    Err(DispatchError::Timeout { timeout_ms })
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
