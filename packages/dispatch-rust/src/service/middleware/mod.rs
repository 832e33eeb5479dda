//! Tower middleware layers for dispatch.
//!
//! - [`timeout`]: Per-dispatch timeout enforcement
//! - [`metrics`]: Dispatch timing and outcome via `tracing` spans
//! - [`pipeline`]: Composes the layers around a [`RequestService`](super::RequestService)

pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use metrics::DispatchMetricsLayer;
pub use pipeline::build_dispatch_stack;
pub use timeout::DispatchTimeoutLayer;
