//! Metrics middleware for dispatch.
//!
//! Records dispatch duration and outcome on `tracing` spans rather than a
//! metrics registry.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use courier_core::TypeKey;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::error::DispatchError;

// ---------------------------------------------------------------------------
// DispatchMetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments dispatches with timing and outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchMetricsLayer;

impl<S> Layer<S> for DispatchMetricsLayer {
    type Service = DispatchMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchMetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// DispatchMetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome in tracing spans.
#[derive(Debug, Clone)]
pub struct DispatchMetricsService<S> {
    inner: S,
}

impl<S, R> Service<R> for DispatchMetricsService<S>
where
    R: 'static,
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
        let request_type = TypeKey::of::<R>().short_name();

        let span = info_span!(
            "dispatch_call",
            request = request_type,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(DispatchError::Timeout { .. }) => "timeout",
                    Err(_) => "error",
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                tracing::info!(
                    request = request_type,
                    duration_ms,
                    outcome,
                    "dispatch complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    /// Immediately-completing service; odd inputs fail.
    struct ImmediateService;

    impl Service<u32> for ImmediateService {
        type Response = u32;
        type Error = DispatchError;
        type Future = Pin<Box<dyn Future<Output = Result<u32, DispatchError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, value: u32) -> Self::Future {
            Box::pin(async move {
                if value % 2 == 0 {
                    Ok(value)
                } else {
                    Err(DispatchError::Cancelled)
                }
            })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = DispatchMetricsLayer.layer(ImmediateService);
        assert_eq!(svc.oneshot(42).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_error() {
        let svc = DispatchMetricsLayer.layer(ImmediateService);
        let err = svc.oneshot(7).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
    }
}
