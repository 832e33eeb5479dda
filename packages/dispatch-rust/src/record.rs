//! Behavior records: a descriptor plus the type-erased binding that turns
//! resolver output into a callable behavior.
//!
//! Records are created during registration and never change afterwards,
//! except for the lazily filled instance cache of singleton behaviors.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use courier_core::{
    BehaviorDescriptor, BehaviorScope, Describe, GroupKey, Lifetime, Priority, TypeKey,
};

use crate::behavior::{GlobalBehavior, OpenBehavior, PipelineBehavior};
use crate::error::DispatchError;
use crate::request::Request;
use crate::resolver::ServiceResolver;

// ---------------------------------------------------------------------------
// Instance resolution helpers
// ---------------------------------------------------------------------------

/// Resolves `T` and downcasts the erased instance.
pub(crate) fn resolve_as<T: Send + Sync + 'static>(
    resolver: &dyn ServiceResolver,
    lifetime: Lifetime,
) -> Result<Arc<T>, DispatchError> {
    let service = TypeKey::of::<T>();
    resolver
        .resolve(service, lifetime)?
        .downcast::<T>()
        .map_err(|_| DispatchError::InstanceTypeMismatch { service })
}

/// Holds the shared instance of a singleton; other lifetimes bypass it.
pub(crate) struct InstanceSlot<T: ?Sized> {
    cached: OnceLock<Arc<T>>,
}

impl<T: ?Sized> InstanceSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            cached: OnceLock::new(),
        }
    }

    /// Returns the cached instance for singletons, resolving it on first use;
    /// calls `resolve` every time for any other lifetime.
    ///
    /// Two dispatches racing on the first resolution may both call `resolve`,
    /// but both end up with the instance that was stored first.
    pub(crate) fn get_or_resolve(
        &self,
        lifetime: Lifetime,
        resolve: impl FnOnce() -> Result<Arc<T>, DispatchError>,
    ) -> Result<Arc<T>, DispatchError> {
        if !lifetime.is_cacheable() {
            return resolve();
        }
        if let Some(instance) = self.cached.get() {
            return Ok(Arc::clone(instance));
        }
        let fresh = resolve()?;
        Ok(Arc::clone(self.cached.get_or_init(|| fresh)))
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

type ResolveGlobal =
    fn(&dyn ServiceResolver, Lifetime) -> Result<Arc<dyn GlobalBehavior>, DispatchError>;

struct GlobalBinding {
    resolve: ResolveGlobal,
    slot: InstanceSlot<dyn GlobalBehavior>,
}

type ResolveTyped<R> =
    fn(&dyn ServiceResolver, Lifetime) -> Result<Arc<dyn PipelineBehavior<R>>, DispatchError>;

/// Binding for one request type, stored erased as `Box<dyn Any>` and
/// recovered by downcasting with the dispatched request type.
struct TypedBinding<R: Request> {
    resolve: ResolveTyped<R>,
    slot: InstanceSlot<dyn PipelineBehavior<R>>,
}

impl<R: Request> TypedBinding<R> {
    fn concrete<B: PipelineBehavior<R>>() -> Self {
        Self {
            resolve: |resolver, lifetime| {
                let behavior: Arc<dyn PipelineBehavior<R>> = resolve_as::<B>(resolver, lifetime)?;
                Ok(behavior)
            },
            slot: InstanceSlot::new(),
        }
    }

    fn closed<T: OpenBehavior>() -> Self {
        Self {
            resolve: |resolver, lifetime| {
                let template = resolve_as::<T>(resolver, lifetime)?;
                let behavior: Arc<dyn PipelineBehavior<R>> = Arc::new(template.close::<R>());
                Ok(behavior)
            },
            slot: InstanceSlot::new(),
        }
    }

    fn instance(
        &self,
        resolver: &dyn ServiceResolver,
        lifetime: Lifetime,
    ) -> Result<Arc<dyn PipelineBehavior<R>>, DispatchError> {
        self.slot
            .get_or_resolve(lifetime, || (self.resolve)(resolver, lifetime))
    }
}

type ErasedBinding = Box<dyn Any + Send + Sync>;

enum Binding {
    Global(GlobalBinding),
    Typed(ErasedBinding),
    /// One binding per request type the template was closed over.
    Open(Vec<(TypeKey, ErasedBinding)>),
}

/// A resolved behavior ready to be invoked for request type `R`.
pub(crate) enum Step<R: Request> {
    Typed(Arc<dyn PipelineBehavior<R>>),
    Global(Arc<dyn GlobalBehavior>),
}

// ---------------------------------------------------------------------------
// BehaviorRecord
// ---------------------------------------------------------------------------

/// A registered behavior: what it is, where it applies, and how to obtain it.
///
/// ```rust,ignore
/// let audit = BehaviorRecord::global::<AuditBehavior>()
///     .priority(10)
///     .lifetime(Lifetime::Singleton);
/// let cache = BehaviorRecord::typed::<CacheBehavior, GetUser>()
///     .group("reads")
///     .marker::<dyn Caching>();
/// ```
pub struct BehaviorRecord {
    descriptor: BehaviorDescriptor,
    binding: Binding,
}

impl BehaviorRecord {
    /// A global behavior applied to every request type.
    #[must_use]
    pub fn global<B: GlobalBehavior>() -> Self {
        Self {
            descriptor: BehaviorDescriptor::new(TypeKey::of::<B>(), BehaviorScope::Global),
            binding: Binding::Global(GlobalBinding {
                resolve: |resolver, lifetime| {
                    let behavior: Arc<dyn GlobalBehavior> = resolve_as::<B>(resolver, lifetime)?;
                    Ok(behavior)
                },
                slot: InstanceSlot::new(),
            }),
        }
    }

    /// A behavior bound to request type `R`.
    #[must_use]
    pub fn typed<B, R>() -> Self
    where
        B: PipelineBehavior<R>,
        R: Request,
    {
        Self {
            descriptor: BehaviorDescriptor::new(
                TypeKey::of::<B>(),
                BehaviorScope::Typed {
                    request: TypeKey::of::<R>(),
                    response: TypeKey::of::<R::Response>(),
                },
            ),
            binding: Binding::Typed(Box::new(TypedBinding::<R>::concrete::<B>())),
        }
    }

    /// An open-generic template. Close it over request types with
    /// [`OpenBehaviorRecord::close_over`].
    #[must_use]
    pub fn open<T: OpenBehavior>() -> OpenBehaviorRecord<T> {
        OpenBehaviorRecord {
            record: Self {
                descriptor: BehaviorDescriptor::new(
                    TypeKey::of::<T>(),
                    BehaviorScope::OpenGeneric {
                        closed_over: Vec::new(),
                    },
                ),
                binding: Binding::Open(Vec::new()),
            },
            _template: PhantomData,
        }
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.descriptor = self.descriptor.with_priority(priority);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<GroupKey>) -> Self {
        self.descriptor = self.descriptor.in_group(group);
        self
    }

    #[must_use]
    pub fn marker<M: ?Sized + 'static>(mut self) -> Self {
        self.descriptor = self.descriptor.with_marker::<M>();
        self
    }

    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.descriptor = self.descriptor.with_lifetime(lifetime);
        self
    }

    #[must_use]
    pub fn identity(&self) -> TypeKey {
        self.descriptor.identity
    }

    /// Resolves the behavior instance to run for request type `R`.
    pub(crate) fn step_for<R: Request>(
        &self,
        resolver: &dyn ServiceResolver,
    ) -> Result<Step<R>, DispatchError> {
        let lifetime = self.descriptor.lifetime;
        match &self.binding {
            Binding::Global(binding) => {
                let behavior = binding
                    .slot
                    .get_or_resolve(lifetime, || (binding.resolve)(resolver, lifetime))?;
                Ok(Step::Global(behavior))
            }
            Binding::Typed(erased) => {
                let binding = self.downcast_binding::<R>(erased)?;
                Ok(Step::Typed(binding.instance(resolver, lifetime)?))
            }
            Binding::Open(closings) => {
                let request = TypeKey::of::<R>();
                let erased = closings
                    .iter()
                    .find(|(bound, _)| *bound == request)
                    .map(|(_, erased)| erased)
                    .ok_or_else(|| self.scope_mismatch::<R>())?;
                let binding = self.downcast_binding::<R>(erased)?;
                Ok(Step::Typed(binding.instance(resolver, lifetime)?))
            }
        }
    }

    fn downcast_binding<'b, R: Request>(
        &self,
        erased: &'b ErasedBinding,
    ) -> Result<&'b TypedBinding<R>, DispatchError> {
        erased
            .downcast_ref::<TypedBinding<R>>()
            .ok_or_else(|| self.scope_mismatch::<R>())
    }

    fn scope_mismatch<R: Request>(&self) -> DispatchError {
        DispatchError::ScopeMismatch {
            behavior: self.descriptor.identity,
            request: TypeKey::of::<R>(),
        }
    }
}

impl Describe for BehaviorRecord {
    fn descriptor(&self) -> &BehaviorDescriptor {
        &self.descriptor
    }
}

impl std::fmt::Debug for BehaviorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRecord")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// OpenBehaviorRecord
// ---------------------------------------------------------------------------

/// Registration builder for an open-generic template `T`.
pub struct OpenBehaviorRecord<T: OpenBehavior> {
    record: BehaviorRecord,
    _template: PhantomData<fn() -> T>,
}

impl<T: OpenBehavior> OpenBehaviorRecord<T> {
    /// Makes the template available for request type `R`. Closing over the
    /// same request type twice has no further effect.
    #[must_use]
    pub fn close_over<R: Request>(mut self) -> Self {
        let request = TypeKey::of::<R>();
        if let BehaviorScope::OpenGeneric { closed_over } = &mut self.record.descriptor.scope {
            if closed_over.contains(&request) {
                return self;
            }
            closed_over.push(request);
        }
        if let Binding::Open(closings) = &mut self.record.binding {
            closings.push((request, Box::new(TypedBinding::<R>::closed::<T>())));
        }
        self
    }

    #[must_use]
    pub fn priority(self, priority: Priority) -> Self {
        self.map(|r| r.priority(priority))
    }

    #[must_use]
    pub fn group(self, group: impl Into<GroupKey>) -> Self {
        self.map(|r| r.group(group))
    }

    #[must_use]
    pub fn marker<M: ?Sized + 'static>(self) -> Self {
        self.map(BehaviorRecord::marker::<M>)
    }

    #[must_use]
    pub fn lifetime(self, lifetime: Lifetime) -> Self {
        self.map(|r| r.lifetime(lifetime))
    }

    fn map(self, f: impl FnOnce(BehaviorRecord) -> BehaviorRecord) -> Self {
        Self {
            record: f(self.record),
            _template: PhantomData,
        }
    }
}

impl<T: OpenBehavior> From<OpenBehaviorRecord<T>> for BehaviorRecord {
    fn from(open: OpenBehaviorRecord<T>) -> Self {
        open.record
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
