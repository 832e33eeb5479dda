//! Chain executor: drives the selected behaviors in order and finally the
//! handler.
//!
//! Each behavior receives a continuation ([`Next`] or [`ErasedNext`]) that
//! advances a cursor over the selected records. A behavior may await the
//! continuation once (delegate) or not at all (short-circuit). Errors unwind
//! through every frame already entered, untouched.

use std::future::Future;
use std::pin::Pin;

use courier_core::{Describe, RequestContext, TypeKey};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::behavior::AnyResponse;
use crate::error::DispatchError;
use crate::handler::HandlerBinding;
use crate::record::{BehaviorRecord, Step};
use crate::request::Request;
use crate::resolver::ServiceResolver;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Everything one dispatch needs, borrowed for its duration.
pub(crate) struct Chain<'a, R: Request> {
    pub(crate) behaviors: &'a [&'a BehaviorRecord],
    pub(crate) handler: &'a HandlerBinding<R>,
    pub(crate) resolver: &'a dyn ServiceResolver,
    pub(crate) request: &'a R,
    pub(crate) context: RequestContext,
    pub(crate) cancel: &'a CancellationToken,
}

impl<'a, R: Request> Chain<'a, R> {
    /// Runs the behavior at `cursor`, or the handler once the cursor is past
    /// the last behavior.
    pub(crate) fn advance(
        &'a self,
        cursor: usize,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
        Box::pin(async move {
            let Some(record) = self.behaviors.get(cursor) else {
                trace!(request = self.context.request_type.short_name(), "invoking handler");
                return self
                    .handler
                    .invoke(self.resolver, self.request, self.cancel)
                    .await;
            };

            let identity = record.descriptor().identity;
            trace!(behavior = identity.short_name(), cursor, "invoking behavior");

            let next = Next {
                chain: self,
                cursor: cursor + 1,
            };
            match record.step_for::<R>(self.resolver)? {
                Step::Typed(behavior) => behavior.handle(self.request, next, self.cancel).await,
                Step::Global(behavior) => {
                    let response = behavior
                        .handle(self.request, &self.context, ErasedNext::new(next), self.cancel)
                        .await?;
                    downcast_response::<R>(response, identity)
                }
            }
        })
    }
}

/// The single checked cast from the erased global path back to the typed chain.
fn downcast_response<R: Request>(
    response: AnyResponse,
    behavior: TypeKey,
) -> Result<R::Response, DispatchError> {
    response
        .downcast::<R::Response>()
        .map(|typed| *typed)
        .map_err(|_| DispatchError::ResponseTypeMismatch {
            behavior,
            expected: TypeKey::of::<R::Response>(),
        })
}

// ---------------------------------------------------------------------------
// Next
// ---------------------------------------------------------------------------

/// Continuation handed to a typed behavior.
///
/// `run` consumes the continuation, so a behavior can delegate at most once.
/// Dropping it without running short-circuits the rest of the chain.
pub struct Next<'a, R: Request> {
    chain: &'a Chain<'a, R>,
    cursor: usize,
}

impl<'a, R: Request> Next<'a, R> {
    /// Runs the remaining behaviors and the handler.
    pub fn run(self) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
        self.chain.advance(self.cursor)
    }

    /// Number of behaviors still ahead of the handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chain.behaviors.len().saturating_sub(self.cursor)
    }

    /// Cancellation signal of the current dispatch.
    #[must_use]
    pub fn cancellation(&self) -> &'a CancellationToken {
        self.chain.cancel
    }
}

// ---------------------------------------------------------------------------
// ErasedNext
// ---------------------------------------------------------------------------

/// Continuation handed to a global behavior; yields the response boxed.
///
/// The wrapped future is lazy: nothing downstream runs until `run` is awaited.
pub struct ErasedNext<'a> {
    future: BoxFuture<'a, Result<AnyResponse, DispatchError>>,
    remaining: usize,
}

impl<'a> ErasedNext<'a> {
    fn new<R: Request>(next: Next<'a, R>) -> Self {
        let remaining = next.remaining();
        Self {
            future: Box::pin(async move {
                let response = next.run().await?;
                Ok(Box::new(response) as AnyResponse)
            }),
            remaining,
        }
    }

    /// Runs the remaining behaviors and the handler.
    pub fn run(self) -> BoxFuture<'a, Result<AnyResponse, DispatchError>> {
        self.future
    }

    /// Number of behaviors still ahead of the handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
