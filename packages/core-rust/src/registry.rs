//! Behavior registry: registration with dedup, one-time ordering, and the
//! scope/group/exclusion selection algebra.
//!
//! The registry is built in two phases. A [`RegistryBuilder`] collects
//! entries in registration order and drops duplicates; [`RegistryBuilder::finalize`]
//! sorts them by `(priority, registration order)` and derives the ungrouped
//! and per-group views. The resulting [`BehaviorRegistry`] is read-only and
//! safe to share across threads.

use std::collections::HashMap;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::descriptor::Describe;
use crate::types::{GroupKey, Priority, TypeKey};

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Collects behavior entries before the registry is finalized.
#[derive(Debug)]
pub struct RegistryBuilder<E> {
    entries: Vec<E>,
}

impl<E: Describe> RegistryBuilder<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends `entry` unless an entry with the same identity and scope is
    /// already registered, in which case the first registration wins.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn register(&mut self, entry: E) -> bool {
        let incoming = entry.descriptor();
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.descriptor().duplicates(incoming))
        {
            debug!(
                behavior = incoming.identity.name(),
                kept_priority = existing.descriptor().priority,
                dropped_priority = incoming.priority,
                "duplicate behavior registration ignored"
            );
            return false;
        }
        self.entries.push(entry);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorts all views by `(priority, registration order)` and freezes the
    /// registry.
    #[must_use]
    pub fn finalize(self) -> BehaviorRegistry<E> {
        let mut entries = self.entries;
        // Stable: equal priorities keep registration order.
        entries.sort_by_key(|e| e.descriptor().priority);

        let mut ungrouped = Vec::new();
        let mut groups: HashMap<GroupKey, Vec<usize>> = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            let desc = entry.descriptor();
            if desc.is_ungrouped() {
                ungrouped.push(position);
            } else {
                for group in &desc.groups {
                    groups.entry(group.clone()).or_default().push(position);
                }
            }
        }

        debug!(
            behaviors = entries.len(),
            ungrouped = ungrouped.len(),
            groups = groups.len(),
            "behavior registry finalized"
        );

        BehaviorRegistry {
            entries,
            ungrouped,
            groups,
        }
    }
}

impl<E: Describe> Default for RegistryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BehaviorRegistry
// ---------------------------------------------------------------------------

/// Finalized, read-only behavior registry.
///
/// `entries` is sorted by `(priority, registration order)`, so an entry's
/// position is a total order over the registry. The ungrouped list and every
/// group list hold positions in ascending order.
#[derive(Debug)]
pub struct BehaviorRegistry<E> {
    entries: Vec<E>,
    ungrouped: Vec<usize>,
    groups: HashMap<GroupKey, Vec<usize>>,
}

impl<E: Describe> BehaviorRegistry<E> {
    /// An empty, already finalized registry.
    #[must_use]
    pub fn empty() -> Self {
        RegistryBuilder::new().finalize()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in `(priority, registration order)`.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }

    /// Ungrouped entries in execution order.
    pub fn ungrouped(&self) -> impl Iterator<Item = &E> {
        self.ungrouped.iter().map(|&p| &self.entries[p])
    }

    /// Entries in `group`, in execution order. Unknown groups are empty.
    pub fn group(&self, group: &GroupKey) -> impl Iterator<Item = &E> {
        self.groups
            .get(group)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&p| &self.entries[p])
    }

    pub fn group_keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    /// Computes the ordered behaviors that run for `request` under `config`.
    ///
    /// - No groups requested and `only_groups` unset: the admitted ungrouped
    ///   entries.
    /// - `only_groups` set, or no ungrouped entries exist: the admitted
    ///   entries of the requested groups, each appearing once.
    /// - Otherwise: admitted ungrouped and grouped entries merged by priority.
    ///   At equal priority ungrouped entries run before grouped ones.
    ///
    /// `skip_all` is not consulted; callers short-circuit on it before
    /// selecting.
    #[must_use]
    pub fn select(&self, request: TypeKey, config: &PipelineConfig) -> Vec<&E> {
        if !config.is_only_groups() && config.groups().is_empty() {
            return self
                .admitted(&self.ungrouped, request, config)
                .map(|p| &self.entries[p])
                .collect();
        }

        let grouped = self.select_grouped(request, config);
        if config.is_only_groups() || self.ungrouped.is_empty() {
            return grouped.into_iter().map(|p| &self.entries[p]).collect();
        }

        let ungrouped: Vec<usize> = self.admitted(&self.ungrouped, request, config).collect();
        self.merge(&ungrouped, &grouped)
    }

    fn admitted<'a>(
        &'a self,
        positions: &'a [usize],
        request: TypeKey,
        config: &'a PipelineConfig,
    ) -> impl Iterator<Item = usize> + 'a {
        positions
            .iter()
            .copied()
            .filter(move |&p| config.admits(self.entries[p].descriptor(), request))
    }

    /// Admitted positions from every requested group, ascending and distinct.
    fn select_grouped(&self, request: TypeKey, config: &PipelineConfig) -> Vec<usize> {
        let mut lists = config.groups().iter().filter_map(|g| self.groups.get(g));
        let Some(first) = lists.next() else {
            return Vec::new();
        };

        let mut selected: Vec<usize> = self.admitted(first, request, config).collect();
        let mut unioned = false;
        for list in lists {
            selected.extend(self.admitted(list, request, config));
            unioned = true;
        }
        if unioned {
            // A behavior in two selected groups shows up in both lists.
            selected.sort_unstable();
            selected.dedup();
        }
        selected
    }

    /// Two-pointer merge of two position lists already in execution order.
    fn merge(&self, ungrouped: &[usize], grouped: &[usize]) -> Vec<&E> {
        let mut merged = Vec::with_capacity(ungrouped.len() + grouped.len());
        let (mut i, mut j) = (0, 0);
        while i < ungrouped.len() && j < grouped.len() {
            if self.priority_at(grouped[j]) < self.priority_at(ungrouped[i]) {
                merged.push(&self.entries[grouped[j]]);
                j += 1;
            } else {
                merged.push(&self.entries[ungrouped[i]]);
                i += 1;
            }
        }
        merged.extend(ungrouped[i..].iter().map(|&p| &self.entries[p]));
        merged.extend(grouped[j..].iter().map(|&p| &self.entries[p]));
        merged
    }

    fn priority_at(&self, position: usize) -> Priority {
        self.entries[position].descriptor().priority
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
