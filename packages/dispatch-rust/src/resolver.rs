//! Service resolution seam and an in-memory implementation.
//!
//! The pipeline never constructs behaviors or handlers itself. It asks a
//! [`ServiceResolver`] for an instance by type and passes the registered
//! lifetime as a hint. Singleton caching happens on the pipeline side, so a
//! resolver is free to build a fresh instance on every call.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_core::{Lifetime, TypeKey};
use dashmap::DashMap;
use tracing::debug;

use crate::error::ResolveError;

/// Type-erased service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

// ---------------------------------------------------------------------------
// ServiceResolver trait
// ---------------------------------------------------------------------------

/// Produces service instances by type. Must be safe for concurrent calls.
pub trait ServiceResolver: Send + Sync {
    /// Resolves an instance of `service`. The returned value must downcast to
    /// the concrete type `service` identifies.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` when the type is unknown, construction fails, or
    /// the resolver has been torn down.
    fn resolve(&self, service: TypeKey, lifetime: Lifetime) -> Result<Instance, ResolveError>;
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

type Factory = Arc<dyn Fn(&ServiceRegistry) -> anyhow::Result<Instance> + Send + Sync>;

/// In-memory resolver backed by per-type factories.
///
/// Factories receive the registry so they can resolve their own
/// dependencies. After [`dispose`](Self::dispose) every resolution fails with
/// `ResolveError::Disposed`.
pub struct ServiceRegistry {
    /// `TypeId` -> (type identity, factory).
    factories: DashMap<TypeId, (TypeKey, Factory)>,
    disposed: AtomicBool,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Registers a factory for `T`. A later registration for the same type
    /// replaces the earlier one.
    pub fn add<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let erased: Factory = Arc::new(move |registry: &ServiceRegistry| {
            let instance: Instance = Arc::new(factory(registry)?);
            Ok(instance)
        });
        self.factories.insert(key.id(), (key, erased));
    }

    /// Registers `T::default()` as the factory for `T`.
    pub fn add_default<T: Default + Send + Sync + 'static>(&self) {
        self.add(|_| Ok(T::default()));
    }

    /// Registers a pre-built instance; every resolution returns the same `Arc`.
    pub fn add_instance<T: Send + Sync + 'static>(&self, instance: Arc<T>) {
        let key = TypeKey::of::<T>();
        let erased: Factory = Arc::new(move |_: &ServiceRegistry| {
            let shared: Instance = instance.clone();
            Ok(shared)
        });
        self.factories.insert(key.id(), (key, erased));
    }

    /// Resolves a concrete `T`.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceResolver::resolve`].
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let key = TypeKey::of::<T>();
        self.resolve(key, Lifetime::Transient)?
            .downcast::<T>()
            .map_err(|_| ResolveError::NotRegistered { service: key })
    }

    #[must_use]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<T>())
    }

    /// Tears the registry down. Subsequent resolutions fail.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!(services = self.factories.len(), "service registry disposed");
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceResolver for ServiceRegistry {
    fn resolve(&self, service: TypeKey, _lifetime: Lifetime) -> Result<Instance, ResolveError> {
        if self.is_disposed() {
            return Err(ResolveError::Disposed);
        }
        // Clone the factory out so the map guard is released before the
        // factory runs; factories may resolve their own dependencies.
        let factory = self
            .factories
            .get(&service.id())
            .map(|entry| entry.value().1.clone())
            .ok_or(ResolveError::NotRegistered { service })?;
        factory(self).map_err(|source| ResolveError::Factory { service, source })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
