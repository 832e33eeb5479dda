//! Behavior descriptors: the immutable registration-time description of one
//! interceptor.

use crate::types::{GroupKey, Lifetime, Priority, TypeKey};

// ---------------------------------------------------------------------------
// BehaviorScope
// ---------------------------------------------------------------------------

/// Which requests a behavior applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorScope {
    /// Applies to every request type and operates on an opaque request value.
    Global,
    /// Bound to exactly one request type and its response type.
    Typed { request: TypeKey, response: TypeKey },
    /// A template closed over each listed request type on demand.
    OpenGeneric { closed_over: Vec<TypeKey> },
}

impl BehaviorScope {
    /// Global and open-generic behaviors are the ones dropped by `skip_global`.
    #[must_use]
    pub fn is_global_like(&self) -> bool {
        matches!(self, BehaviorScope::Global | BehaviorScope::OpenGeneric { .. })
    }

    /// Whether a behavior with this scope can run for `request`.
    #[must_use]
    pub fn applies_to(&self, request: TypeKey) -> bool {
        match self {
            BehaviorScope::Global => true,
            BehaviorScope::Typed { request: bound, .. } => *bound == request,
            BehaviorScope::OpenGeneric { closed_over } => closed_over.contains(&request),
        }
    }

    /// Scope identity used for registration dedup. Two open-generic
    /// registrations of the same template are the same scope regardless of
    /// the request types they were closed over.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        match (self, other) {
            (BehaviorScope::Global, BehaviorScope::Global)
            | (BehaviorScope::OpenGeneric { .. }, BehaviorScope::OpenGeneric { .. }) => true,
            (
                BehaviorScope::Typed { request: a, .. },
                BehaviorScope::Typed { request: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// BehaviorDescriptor
// ---------------------------------------------------------------------------

/// Registration-time description of a behavior.
///
/// For open-generic behaviors `identity` is the template's identity, which is
/// also what concrete-type exclusion matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorDescriptor {
    pub identity: TypeKey,
    pub scope: BehaviorScope,
    pub priority: Priority,
    /// Empty means ungrouped.
    pub groups: Vec<GroupKey>,
    /// Capability markers, consulted only by marker exclusion.
    pub markers: Vec<TypeKey>,
    pub lifetime: Lifetime,
}

impl BehaviorDescriptor {
    /// Descriptor with priority 0, no groups, no markers, transient lifetime.
    #[must_use]
    pub fn new(identity: TypeKey, scope: BehaviorScope) -> Self {
        Self {
            identity,
            scope,
            priority: 0,
            groups: Vec::new(),
            markers: Vec::new(),
            lifetime: Lifetime::default(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a group membership. Repeated labels are ignored.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<GroupKey>) -> Self {
        let group = group.into();
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    /// Declares conformance to the marker type `M`.
    #[must_use]
    pub fn with_marker<M: ?Sized + 'static>(mut self) -> Self {
        let marker = TypeKey::of::<M>();
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn is_ungrouped(&self) -> bool {
        self.groups.is_empty()
    }

    /// True when `other` would be rejected as a duplicate of `self`.
    #[must_use]
    pub fn duplicates(&self, other: &BehaviorDescriptor) -> bool {
        self.identity == other.identity && self.scope.same_kind(&other.scope)
    }
}

// ---------------------------------------------------------------------------
// Describe
// ---------------------------------------------------------------------------

/// Anything the registry can index: it only needs to see the descriptor.
pub trait Describe {
    fn descriptor(&self) -> &BehaviorDescriptor;
}

impl Describe for BehaviorDescriptor {
    fn descriptor(&self) -> &BehaviorDescriptor {
        self
    }
}
