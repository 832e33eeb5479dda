use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Execution priority of a behavior. Lower values run earlier.
pub type Priority = i32;

// ---------------------------------------------------------------------------
// TypeKey
// ---------------------------------------------------------------------------

/// Runtime identity of a Rust type, used for behavior identity, marker tags,
/// and request/response binding.
///
/// Equality and hashing use only the `TypeId`; the name is carried for
/// diagnostics and log output.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Identity of `T`. Unsized types are accepted so trait objects
    /// (`dyn Marker`) can serve as marker tags.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, as reported by `std::any::type_name`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name (generic arguments stripped).
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// GroupKey
// ---------------------------------------------------------------------------

/// Opaque label used to opt behaviors into a pipeline at call time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(Arc<str>);

impl GroupKey {
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self(label.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupKey {
    fn from(label: &str) -> Self {
        Self(Arc::from(label))
    }
}

impl From<String> for GroupKey {
    fn from(label: String) -> Self {
        Self(Arc::from(label))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Lifetime
// ---------------------------------------------------------------------------

/// Resolution lifetime hint passed to the service resolver.
///
/// Only `Singleton` instances are cached by the pipeline; every other
/// lifetime is re-resolved on each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    Singleton,
    Scoped,
    #[default]
    Transient,
}

impl Lifetime {
    #[must_use]
    pub fn is_cacheable(self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Alpha;
    trait Marker {}

    mod nested {
        pub struct Wrapper<T>(pub T);
    }

    #[test]
    fn type_key_equality_uses_type_id() {
        assert_eq!(TypeKey::of::<Alpha>(), TypeKey::of::<Alpha>());
        assert_ne!(TypeKey::of::<Alpha>(), TypeKey::of::<u32>());

        let set: HashSet<_> = [TypeKey::of::<Alpha>(), TypeKey::of::<Alpha>()].into();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn type_key_accepts_trait_objects() {
        let key = TypeKey::of::<dyn Marker>();
        assert_eq!(key, TypeKey::of::<dyn Marker>());
        assert_ne!(key, TypeKey::of::<Alpha>());
    }

    #[test]
    fn short_name_strips_path_and_generics() {
        assert_eq!(TypeKey::of::<Alpha>().short_name(), "Alpha");
        assert_eq!(
            TypeKey::of::<nested::Wrapper<Alpha>>().short_name(),
            "Wrapper"
        );
    }

    #[test]
    fn group_key_serializes_as_plain_string() {
        let key = GroupKey::from("admin");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"admin\"");
        let back: GroupKey = serde_json::from_str("\"audit\"").unwrap();
        assert_eq!(back.as_str(), "audit");
    }

    #[test]
    fn only_singleton_is_cacheable() {
        assert!(Lifetime::Singleton.is_cacheable());
        assert!(!Lifetime::Scoped.is_cacheable());
        assert!(!Lifetime::Transient.is_cacheable());
        assert_eq!(Lifetime::default(), Lifetime::Transient);
    }
}
