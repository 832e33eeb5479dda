//! Call-time pipeline configuration.
//!
//! A `PipelineConfig` is an immutable filter description. Every builder
//! method takes `&self` and returns a new value, so a base configuration can
//! be shared across concurrent calls and extended per call without affecting
//! other holders.

use crate::descriptor::BehaviorDescriptor;
use crate::types::{GroupKey, TypeKey};

/// Immutable description of which behaviors are eligible for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    skip_all: bool,
    skip_global: bool,
    only_groups: bool,
    groups: Vec<GroupKey>,
    excluded_markers: Vec<TypeKey>,
    excluded_types: Vec<TypeKey>,
}

impl PipelineConfig {
    /// The default configuration: every ungrouped behavior, nothing excluded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass every behavior and call the handler directly. Takes precedence
    /// over every other option.
    #[must_use]
    pub fn skip_all(&self) -> Self {
        Self {
            skip_all: true,
            ..self.clone()
        }
    }

    /// Adds `group` to the active group set. Groups keep insertion order and
    /// appear at most once.
    #[must_use]
    pub fn with_group(&self, group: impl Into<GroupKey>) -> Self {
        let group = group.into();
        let mut next = self.clone();
        if !next.groups.contains(&group) {
            next.groups.push(group);
        }
        next
    }

    /// Drops every behavior that declares the marker `M`.
    #[must_use]
    pub fn exclude_marker<M: ?Sized + 'static>(&self) -> Self {
        self.exclude_marker_key(TypeKey::of::<M>())
    }

    #[must_use]
    pub fn exclude_marker_key(&self, marker: TypeKey) -> Self {
        let mut next = self.clone();
        if !next.excluded_markers.contains(&marker) {
            next.excluded_markers.push(marker);
        }
        next
    }

    /// Drops the behavior (or open-generic template) whose identity is `T`.
    #[must_use]
    pub fn exclude_concrete<T: ?Sized + 'static>(&self) -> Self {
        self.exclude_concrete_key(TypeKey::of::<T>())
    }

    #[must_use]
    pub fn exclude_concrete_key(&self, identity: TypeKey) -> Self {
        let mut next = self.clone();
        if !next.excluded_types.contains(&identity) {
            next.excluded_types.push(identity);
        }
        next
    }

    /// When set, global and open-generic behaviors are dropped and only typed
    /// behaviors remain eligible.
    #[must_use]
    pub fn skip_global(&self, skip: bool) -> Self {
        Self {
            skip_global: skip,
            ..self.clone()
        }
    }

    /// When set, ungrouped behaviors are excluded and only the listed groups run.
    #[must_use]
    pub fn only_groups(&self, only: bool) -> Self {
        Self {
            only_groups: only,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_skip_all(&self) -> bool {
        self.skip_all
    }

    #[must_use]
    pub fn is_skip_global(&self) -> bool {
        self.skip_global
    }

    #[must_use]
    pub fn is_only_groups(&self) -> bool {
        self.only_groups
    }

    #[must_use]
    pub fn groups(&self) -> &[GroupKey] {
        &self.groups
    }

    #[must_use]
    pub fn excluded_markers(&self) -> &[TypeKey] {
        &self.excluded_markers
    }

    #[must_use]
    pub fn excluded_types(&self) -> &[TypeKey] {
        &self.excluded_types
    }

    /// Per-record filter shared by every selection path.
    ///
    /// A descriptor is admitted when its scope applies to `request`, it is not
    /// dropped by `skip_global`, it declares none of the excluded markers, and
    /// its identity is not excluded. Group membership is not checked here.
    #[must_use]
    pub fn admits(&self, descriptor: &BehaviorDescriptor, request: TypeKey) -> bool {
        if self.skip_global && descriptor.scope.is_global_like() {
            return false;
        }
        if !descriptor.scope.applies_to(request) {
            return false;
        }
        if descriptor
            .markers
            .iter()
            .any(|m| self.excluded_markers.contains(m))
        {
            return false;
        }
        !self.excluded_types.contains(&descriptor.identity)
    }
}
