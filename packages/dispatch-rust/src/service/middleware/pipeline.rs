//! Stack composition: wraps a [`RequestService`] with the dispatch layers.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::metrics::DispatchMetricsLayer;
use super::timeout::DispatchTimeoutLayer;
use crate::config::MediatorConfig;
use crate::error::DispatchError;
use crate::mediator::Mediator;
use crate::request::Request;
use crate::service::endpoint::RequestService;

/// Builds the dispatch stack for request type `R`.
///
/// Layer order (outermost to innermost):
/// 1. `DispatchTimeoutLayer` -- bound the whole dispatch
/// 2. `DispatchMetricsLayer` -- record timing and outcome (closest to the mediator)
///
/// The service uses the mediator's default pipeline.
#[must_use]
pub fn build_dispatch_stack<R: Request>(
    mediator: Arc<Mediator>,
    config: &MediatorConfig,
) -> impl tower::Service<R, Response = R::Response, Error = DispatchError> + Clone {
    ServiceBuilder::new()
        .layer(DispatchTimeoutLayer::new(config.dispatch_timeout()))
        .layer(DispatchMetricsLayer)
        .service(RequestService::<R>::new(mediator))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use courier_core::Lifetime;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::behavior::PipelineBehavior;
    use crate::executor::Next;
    use crate::record::BehaviorRecord;
    use crate::resolver::ServiceRegistry;
    use crate::test_support::{EventLog, Ping, PingHandler, Tagged};

    /// Delays every dispatch by one second before delegating.
    #[derive(Default)]
    struct Stall;

    #[async_trait]
    impl PipelineBehavior<Ping> for Stall {
        async fn handle(
            &self,
            _request: &Ping,
            next: Next<'_, Ping>,
            _cancel: &CancellationToken,
        ) -> Result<String, DispatchError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            next.run().await
        }
    }

    fn mediator(log: &EventLog, stall: bool) -> Arc<Mediator> {
        let resolver = ServiceRegistry::new();
        let l = log.clone();
        resolver.add(move |_| Ok(PingHandler::new(l.clone())));
        let l = log.clone();
        resolver.add(move |_| Ok(Tagged::new(l.clone())));
        resolver.add_default::<Stall>();

        let mut builder = Mediator::builder(Arc::new(resolver))
            .handler::<Ping, PingHandler>(Lifetime::Transient)
            .behavior(BehaviorRecord::global::<Tagged>());
        if stall {
            builder = builder.behavior(BehaviorRecord::typed::<Stall, Ping>().priority(10));
        }
        Arc::new(builder.build())
    }

    #[tokio::test]
    async fn stack_routes_through_all_layers() {
        let log = EventLog::default();
        let config = MediatorConfig {
            dispatch_timeout_ms: Some(5_000),
            ..MediatorConfig::default()
        };

        let svc = build_dispatch_stack::<Ping>(mediator(&log, false), &config);
        let response = svc.oneshot(Ping::new("stack")).await.unwrap();
        assert_eq!(response, "pong:stack");
        assert_eq!(
            log.entries(),
            vec!["global:Ping->String", "handler", "global-after"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_dispatch_times_out() {
        let log = EventLog::default();
        let config = MediatorConfig {
            dispatch_timeout_ms: Some(100),
            ..MediatorConfig::default()
        };

        let svc = build_dispatch_stack::<Ping>(mediator(&log, true), &config);
        let err = svc.oneshot(Ping::new("slow")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { timeout_ms: 100 }));
        assert_eq!(log.entries(), vec!["global:Ping->String"]);
    }
}
