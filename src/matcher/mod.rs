pub mod compat;

pub use compat::{identical, numeric_convertible, relate, TypeRelation};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::config::CopyOptions;
use crate::model::{FieldDescriptor, FieldType, StructDescriptor, TypeIndex};

/// Rule that paired a destination field with a source field, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchRule {
    ExactName,
    TagAlias,
    CaseInsensitive,
    /// Embedded destination struct filled from the whole source struct
    Embedded,
    Unmatched,
    /// Destination field not writable from the output package
    Unexported,
}

impl MatchRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::ExactName => "exact-name",
            MatchRule::TagAlias => "tag-alias",
            MatchRule::CaseInsensitive => "case-insensitive",
            MatchRule::Embedded => "embedded",
            MatchRule::Unmatched => "unmatched",
            MatchRule::Unexported => "unexported",
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field readable from the source struct, either declared on it or
/// promoted from an embedded struct
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceField {
    /// Selector path from the source value, ending with the field name.
    /// Empty when the source value itself is copied.
    pub path: Vec<String>,
    pub field: FieldDescriptor,
}

impl SourceField {
    fn direct(field: &FieldDescriptor) -> Self {
        Self {
            path: vec![field.name.clone()],
            field: field.clone(),
        }
    }

    fn promoted(embedded: &str, field: &FieldDescriptor) -> Self {
        Self {
            path: vec![embedded.to_string(), field.name.clone()],
            field: field.clone(),
        }
    }

    /// The source struct as a whole, copied into an embedded destination
    /// struct
    fn whole(source: &StructDescriptor) -> Self {
        Self {
            path: Vec::new(),
            field: FieldDescriptor::new(&source.name, FieldType::Named(source.type_ref())),
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn is_promoted(&self) -> bool {
        self.path.len() > 1
    }

    pub fn is_whole(&self) -> bool {
        self.path.is_empty()
    }

    /// Go selector, e.g. `Base.ID`
    pub fn selector(&self) -> String {
        self.path.join(".")
    }
}

/// Matching outcome for one destination field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMapping {
    pub destination: FieldDescriptor,
    pub source: Option<SourceField>,
    pub rule: MatchRule,
    pub relation: TypeRelation,
}

impl FieldMapping {
    pub fn unmatched(destination: FieldDescriptor) -> Self {
        Self {
            destination,
            source: None,
            rule: MatchRule::Unmatched,
            relation: TypeRelation::Incompatible,
        }
    }

    pub fn unexported(destination: FieldDescriptor) -> Self {
        Self {
            rule: MatchRule::Unexported,
            ..Self::unmatched(destination)
        }
    }

    pub fn is_matched(&self) -> bool {
        self.source.is_some()
    }

    /// Matched and copyable
    pub fn is_compatible(&self) -> bool {
        self.is_matched() && self.relation.is_compatible()
    }

    pub fn is_lossy(&self) -> bool {
        self.relation.is_lossy()
    }
}

/// Pairs destination fields with source fields
pub struct FieldMatcher<'a> {
    index: &'a TypeIndex,
    options: &'a CopyOptions,
}

impl<'a> FieldMatcher<'a> {
    pub fn new(index: &'a TypeIndex, options: &'a CopyOptions) -> Self {
        Self { index, options }
    }

    /// One mapping per destination field, in destination declaration order
    pub fn match_structs(
        &self,
        source: &StructDescriptor,
        destination: &StructDescriptor,
    ) -> Vec<FieldMapping> {
        let candidates = self.candidates(source);
        let mappings: Vec<FieldMapping> = destination
            .fields
            .iter()
            .map(|field| {
                let mapping = self.match_field(destination, field, &candidates);
                if mapping.rule == MatchRule::Unmatched {
                    self.match_embedded(source, mapping)
                } else {
                    mapping
                }
            })
            .collect();

        debug!(
            source = %source.type_ref(),
            destination = %destination.type_ref(),
            matched = mappings.iter().filter(|m| m.is_matched()).count(),
            total = mappings.len(),
            "Matched fields"
        );
        mappings
    }

    /// Source fields eligible for matching: declared fields first, then fields
    /// promoted from embedded structs that no declared field shadows.
    /// Promoted names that occur in several embedded structs are ambiguous
    /// and left out, as Go does.
    pub fn candidates(&self, source: &StructDescriptor) -> Vec<SourceField> {
        let mut candidates: Vec<SourceField> = source
            .fields
            .iter()
            .filter(|field| !field.is_ignored() && self.accessible(&source.package, field))
            .map(SourceField::direct)
            .collect();

        let mut promoted = Vec::new();
        for embedded in source
            .fields
            .iter()
            .filter(|f| f.embedded && !f.is_ignored() && self.accessible(&source.package, f))
        {
            // Embedded pointers are not followed; they may be nil
            let Some(inner) = self.index.struct_of(&embedded.ty) else {
                continue;
            };
            promoted.extend(
                inner
                    .fields
                    .iter()
                    .filter(|field| !field.is_ignored() && self.accessible(&inner.package, field))
                    .map(|field| SourceField::promoted(&embedded.name, field)),
            );
        }

        let mut occurrences: HashMap<String, usize> = HashMap::new();
        for field in &promoted {
            *occurrences.entry(field.name().to_string()).or_default() += 1;
        }
        let promoted: Vec<SourceField> = promoted
            .into_iter()
            .filter(|field| {
                occurrences.get(field.name()) == Some(&1)
                    && !candidates.iter().any(|direct| direct.name() == field.name())
            })
            .collect();
        candidates.extend(promoted);
        candidates
    }

    fn rules(&self) -> Vec<MatchRule> {
        let mut rules = vec![MatchRule::ExactName];
        if self.options.use_tag_aliases {
            rules.push(MatchRule::TagAlias);
        }
        if self.options.match_case_insensitive {
            rules.push(MatchRule::CaseInsensitive);
        }
        rules
    }

    /// The first rule with a type-compatible candidate wins; candidates are
    /// tried in source declaration order. Without one, the first name match
    /// is kept so the plan builder can report the type conflict.
    fn match_field(
        &self,
        owner: &StructDescriptor,
        destination: &FieldDescriptor,
        candidates: &[SourceField],
    ) -> FieldMapping {
        if destination.is_ignored() {
            trace!(field = %destination.name, "Destination field excluded by tag");
            return FieldMapping::unmatched(destination.clone());
        }
        if !self.accessible(&owner.package, destination) {
            trace!(field = %destination.name, "Destination field is unexported");
            return FieldMapping::unexported(destination.clone());
        }

        let mut conflict: Option<FieldMapping> = None;
        for rule in self.rules() {
            for candidate in candidates.iter().filter(|c| self.names_match(rule, destination, c)) {
                let relation = relate(self.index, &candidate.field.ty, &destination.ty);
                let mapping = FieldMapping {
                    destination: destination.clone(),
                    source: Some(candidate.clone()),
                    rule,
                    relation,
                };
                if relation.is_compatible() {
                    trace!(
                        field = %destination.name,
                        source = %candidate.selector(),
                        rule = %rule,
                        lossy = relation.is_lossy(),
                        "Field matched"
                    );
                    return mapping;
                }
                if conflict.is_none() {
                    conflict = Some(mapping);
                }
            }
        }

        conflict.unwrap_or_else(|| {
            trace!(field = %destination.name, "No source field");
            FieldMapping::unmatched(destination.clone())
        })
    }

    /// A value-embedded destination struct without a counterpart of its own
    /// is copied from the source struct, so its promoted fields are filled
    /// from the source's fields
    fn match_embedded(&self, source: &StructDescriptor, mapping: FieldMapping) -> FieldMapping {
        let destination = &mapping.destination;
        let embeds_struct = destination.embedded
            && !destination.is_ignored()
            && matches!(destination.ty, FieldType::Named(_))
            && self.index.struct_of(&destination.ty).is_some();
        if !embeds_struct {
            return mapping;
        }

        let whole = SourceField::whole(source);
        let relation = relate(self.index, &whole.field.ty, &destination.ty);
        trace!(field = %destination.name, source = %source.name, "Embedded struct filled from source");
        FieldMapping {
            source: Some(whole),
            rule: MatchRule::Embedded,
            relation,
            ..mapping
        }
    }

    /// Generated code can only name unexported fields inside their package
    fn accessible(&self, package: &str, field: &FieldDescriptor) -> bool {
        field.is_exported() || self.options.is_output_package(package)
    }

    fn names_match(&self, rule: MatchRule, destination: &FieldDescriptor, source: &SourceField) -> bool {
        match rule {
            MatchRule::ExactName => source.name() == destination.name,
            MatchRule::TagAlias => {
                let destination_aliases = self.aliases(destination);
                let source_aliases = self.aliases(&source.field);
                destination_aliases.iter().any(|alias| {
                    eq_fold(alias, source.name())
                        || source_aliases.iter().any(|other| eq_fold(alias, other))
                }) || source_aliases
                    .iter()
                    .any(|alias| eq_fold(alias, &destination.name))
            }
            MatchRule::CaseInsensitive => eq_fold(source.name(), &destination.name),
            MatchRule::Embedded | MatchRule::Unmatched | MatchRule::Unexported => false,
        }
    }

    fn aliases<'f>(&self, field: &'f FieldDescriptor) -> Vec<&'f str> {
        self.options
            .alias_tags
            .iter()
            .filter_map(|key| field.tag_alias(key))
            .collect()
    }
}

fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
