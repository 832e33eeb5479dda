use std::sync::Arc;

use courier_core::{Lifetime, TypeKey};
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::record::{resolve_as, InstanceSlot};
use crate::request::{Request, RequestHandler};
use crate::resolver::ServiceResolver;

type ResolveHandler<R> =
    fn(&dyn ServiceResolver, Lifetime) -> Result<Arc<dyn RequestHandler<R>>, DispatchError>;

/// How the handler for request type `R` is obtained.
pub(crate) struct HandlerBinding<R: Request> {
    identity: TypeKey,
    lifetime: Lifetime,
    resolve: ResolveHandler<R>,
    slot: InstanceSlot<dyn RequestHandler<R>>,
}

impl<R: Request> HandlerBinding<R> {
    pub(crate) fn new<H: RequestHandler<R>>(lifetime: Lifetime) -> Self {
        Self {
            identity: TypeKey::of::<H>(),
            lifetime,
            resolve: |resolver, lifetime| {
                let handler: Arc<dyn RequestHandler<R>> = resolve_as::<H>(resolver, lifetime)?;
                Ok(handler)
            },
            slot: InstanceSlot::new(),
        }
    }

    pub(crate) fn identity(&self) -> TypeKey {
        self.identity
    }

    /// Resolves the handler (cached for singletons) and runs it.
    pub(crate) async fn invoke(
        &self,
        resolver: &dyn ServiceResolver,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let handler = self
            .slot
            .get_or_resolve(self.lifetime, || (self.resolve)(resolver, self.lifetime))?;
        handler.handle(request, cancel).await
    }
}
