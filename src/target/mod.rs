//! Build targets: spec strings, hierarchy resolution and target filters.
//!
//! A target may inherit from a base target, which may inherit from another, and so
//! on. [`TargetHierarchyResolver`] walks that chain; [`TargetFilter`] turns the
//! resolved chain into the set of identifiers used to pick `targetDependencies`.

pub mod hierarchy;
pub mod spec;

pub use hierarchy::{
    DerivedTarget, HierarchyEntry, HierarchyOutcome, MissingTarget, TargetHierarchyResolver,
    WalkState,
};
pub use spec::{ParsedTargetSpec, TargetSpec, TargetSpecShape, parse_target_spec};

use std::collections::BTreeSet;

/// Identifiers a component's `targetDependencies` keys are matched against.
///
/// An empty filter matches nothing, so only unconditional dependencies apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    identifiers: BTreeSet<String>,
}

impl TargetFilter {
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }

    /// Every target in the hierarchy plus their `similarTo` identifiers, and the
    /// name of a missing base.
    #[must_use]
    pub fn from_derived(derived: &DerivedTarget) -> Self {
        let mut identifiers: BTreeSet<String> = derived
            .hierarchy
            .iter()
            .flat_map(|target| target.identifiers().map(str::to_string))
            .collect();
        if let Some(missing) = &derived.missing {
            identifiers.insert(missing.name.clone());
        }
        Self {
            identifiers,
        }
    }

    /// Only the target's own name, for when its hierarchy is not available.
    #[must_use]
    pub fn from_spec(spec: &TargetSpec) -> Self {
        Self::from_identifiers([spec.name.clone()])
    }

    #[must_use]
    pub fn matches(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }
}
