pub mod builder;
pub mod checksum;
pub mod error;

pub use builder::PlanBuilder;
pub use checksum::calculate_checksum;
pub use error::{PlanError, Result};

use hashbrown::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::matcher::FieldMapping;
use crate::model::{FieldType, TypeRef};

/// Ordered (source, destination) struct pair a plan copies between
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub source: TypeRef,
    pub destination: TypeRef,
}

impl PairKey {
    pub fn new(source: TypeRef, destination: TypeRef) -> Self {
        Self {
            source,
            destination,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Reference from a field copy to the plan of a nested struct pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanLink {
    /// Nested plan built as part of this plan
    Inline(Arc<CopyPlan>),
    /// Back-reference to a plan still being built higher up; only occurs
    /// behind a pointer, slice or map
    Recursive(PairKey),
}

impl PlanLink {
    pub fn key(&self) -> &PairKey {
        match self {
            PlanLink::Inline(plan) => &plan.key,
            PlanLink::Recursive(key) => key,
        }
    }
}

impl Hash for PlanLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.key().hash(state);
    }
}

/// How one value is deep-copied into its destination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueCopy {
    /// Plain assignment; the value shares no mutable state
    Assign,
    /// Go conversion to the given destination type
    Convert(FieldType),
    /// Field-by-field copy through a nested plan
    Struct(PlanLink),
    /// Pointer to pointer with a fresh allocation; nil stays nil
    Pointer(Box<ValueCopy>),
    /// Value into a freshly allocated pointer
    AddressOf(Box<ValueCopy>),
    /// Pointer into a value; nil leaves the zero value
    Deref(Box<ValueCopy>),
    /// Element-wise slice or array copy preserving order
    Elements(Box<ValueCopy>),
    /// Entry-wise map copy
    Entries {
        key: Box<ValueCopy>,
        value: Box<ValueCopy>,
    },
}

impl ValueCopy {
    /// Nested plan links reachable from this copy
    pub fn links(&self) -> Vec<&PlanLink> {
        let mut links = Vec::new();
        self.collect_links(&mut links);
        links
    }

    fn collect_links<'a>(&'a self, links: &mut Vec<&'a PlanLink>) {
        match self {
            ValueCopy::Assign | ValueCopy::Convert(_) => {}
            ValueCopy::Struct(link) => links.push(link),
            ValueCopy::Pointer(inner)
            | ValueCopy::AddressOf(inner)
            | ValueCopy::Deref(inner)
            | ValueCopy::Elements(inner) => inner.collect_links(links),
            ValueCopy::Entries { key, value } => {
                key.collect_links(links);
                value.collect_links(links);
            }
        }
    }

    /// Whether the copy is a bare assignment at the top level
    pub fn is_assign(&self) -> bool {
        matches!(self, ValueCopy::Assign)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CopyAction {
    /// Destination field keeps its zero value
    Skip,
    Copy(ValueCopy),
}

/// One destination field of a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CopyStep {
    pub mapping: FieldMapping,
    pub action: CopyAction,
}

impl CopyStep {
    pub fn field(&self) -> &str {
        &self.mapping.destination.name
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.action, CopyAction::Skip)
    }
}

/// Complete recipe for copying one struct pair. Steps follow destination
/// field order. Plans are immutable once built and can be shared across
/// threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CopyPlan {
    pub key: PairKey,
    pub steps: Vec<CopyStep>,
}

impl CopyPlan {
    pub fn step(&self, field: &str) -> Option<&CopyStep> {
        self.steps.iter().find(|step| step.field() == field)
    }

    /// Destination fields whose copy coerces the value
    pub fn lossy_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.steps
            .iter()
            .filter(|step| !step.is_skipped() && step.mapping.is_lossy())
            .map(CopyStep::field)
    }

    pub fn skipped_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.steps
            .iter()
            .filter(|step| step.is_skipped())
            .map(CopyStep::field)
    }

    /// This plan followed by every distinct nested plan, depth-first in
    /// field order
    pub fn plans(&self) -> Vec<&CopyPlan> {
        let mut seen = HashSet::new();
        let mut plans = Vec::new();
        self.collect_plans(&mut seen, &mut plans);
        plans
    }

    fn collect_plans<'a>(&'a self, seen: &mut HashSet<&'a PairKey>, plans: &mut Vec<&'a CopyPlan>) {
        if !seen.insert(&self.key) {
            return;
        }
        plans.push(self);
        for step in &self.steps {
            let CopyAction::Copy(copy) = &step.action else {
                continue;
            };
            for link in copy.links() {
                if let PlanLink::Inline(plan) = link {
                    plan.collect_plans(seen, plans);
                }
            }
        }
    }
}
