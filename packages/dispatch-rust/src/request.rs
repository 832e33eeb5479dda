use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// A value routed to exactly one handler, tagged with the response it expects.
///
/// Requests without a meaningful answer use `()` as their response.
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
}

/// The single terminal handler for request type `R`.
///
/// Handlers are obtained from the service resolver. Checking `cancel` is the
/// handler's own responsibility.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync + 'static {
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError>;
}
