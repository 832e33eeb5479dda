use crate::types::TypeKey;

/// Per-dispatch type tags handed to global behaviors.
///
/// Global behaviors see the request only as an opaque value; this context
/// tells them which concrete request is in flight and which response type the
/// caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Concrete type of the dispatched request.
    pub request_type: TypeKey,
    /// Response type the request declares.
    pub response_type: TypeKey,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_type: TypeKey, response_type: TypeKey) -> Self {
        Self {
            request_type,
            response_type,
        }
    }

    /// Builds the context for the request type `Req` answering with `Res`.
    #[must_use]
    pub fn of<Req: 'static, Res: 'static>() -> Self {
        Self::new(TypeKey::of::<Req>(), TypeKey::of::<Res>())
    }
}
