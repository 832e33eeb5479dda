//! Tower integration: exposes mediator dispatch as a `tower::Service` and
//! provides the middleware layers composed around it.

pub mod endpoint;
pub mod middleware;

pub use endpoint::RequestService;
pub use middleware::{build_dispatch_stack, DispatchMetricsLayer, DispatchTimeoutLayer};
