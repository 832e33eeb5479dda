use std::any::TypeId;

use courier_core::TypeKey;

/// Errors produced while resolving service instances.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no service registered for {service}")]
    NotRegistered { service: TypeKey },
    #[error("service resolver has been disposed")]
    Disposed,
    #[error("factory for {service} failed: {source}")]
    Factory {
        service: TypeKey,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced by `Mediator::send` and friends.
///
/// Behaviors and handlers return this type too. Whatever a failing step
/// returns is exactly what the caller receives; the pipeline never wraps,
/// retries, or swallows errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("request is missing")]
    InvalidRequest,
    #[error("no handler registered for request type {request}")]
    HandlerNotFound { request: TypeKey },
    /// Raised by the type-erased entry point, where only the `TypeId` of the
    /// boxed request is known.
    #[error("no handler registered for request type {type_id:?}")]
    UnknownRequestType { type_id: TypeId },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("behavior {behavior} is not bound to request type {request}")]
    ScopeMismatch { behavior: TypeKey, request: TypeKey },
    #[error("behavior {behavior} returned a response that is not {expected}")]
    ResponseTypeMismatch { behavior: TypeKey, expected: TypeKey },
    #[error("resolved instance for {service} has an unexpected type")]
    InstanceTypeMismatch { service: TypeKey },
    #[error("dispatch timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("dispatch cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}
