use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::debug;

use super::error::{PlanError, Result};
use super::{CopyAction, CopyPlan, CopyStep, PairKey, PlanLink, ValueCopy};
use crate::config::CopyOptions;
use crate::matcher::{relate, FieldMapping, FieldMatcher, MatchRule, TypeRelation};
use crate::model::{FieldType, StructDescriptor, TypeIndex, TypeRef};

/// Why a value copy could not be built
enum Failure {
    /// The caller reports a type conflict for the field
    Incompatible,
    /// Errors were already recorded further down
    Reported,
}

/// Mutable state of one top-level build
#[derive(Default)]
struct BuildState {
    /// Pairs being built, each with whether it was reached through a source
    /// pointer, slice or map
    stack: Vec<(PairKey, bool)>,
    built: FxHashMap<PairKey, Arc<CopyPlan>>,
    failed: FxHashSet<PairKey>,
    errors: Vec<PlanError>,
}

/// Turns field mappings into copy plans, recursing into nested struct pairs
pub struct PlanBuilder<'a> {
    index: &'a TypeIndex,
    matcher: FieldMatcher<'a>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(index: &'a TypeIndex, options: &'a CopyOptions) -> Self {
        Self {
            index,
            matcher: FieldMatcher::new(index, options),
        }
    }

    /// Match and plan a copy from `source` into `destination`
    pub fn plan(&self, source: &TypeRef, destination: &TypeRef) -> Result<CopyPlan> {
        let source_struct = self
            .index
            .get_struct(source)
            .ok_or_else(|| PlanError::UnknownType(source.to_string()))?;
        let destination_struct = self
            .index
            .get_struct(destination)
            .ok_or_else(|| PlanError::UnknownType(destination.to_string()))?;

        for root in [source, destination] {
            if let Some(path) = self.index.find_direct_cycle(root) {
                return Err(PlanError::CyclicStructure { path });
            }
        }

        let mappings = self.matcher.match_structs(source_struct, destination_struct);
        let key = PairKey::new(self.index.canonical(source), self.index.canonical(destination));
        self.build_pair(key, mappings)
    }

    /// Build a plan from mappings already produced for `source` -> `destination`
    pub fn build(
        &self,
        source: &StructDescriptor,
        destination: &StructDescriptor,
        mappings: Vec<FieldMapping>,
    ) -> Result<CopyPlan> {
        let key = PairKey::new(
            self.index.canonical(&source.type_ref()),
            self.index.canonical(&destination.type_ref()),
        );
        self.build_pair(key, mappings)
    }

    fn build_pair(&self, key: PairKey, mappings: Vec<FieldMapping>) -> Result<CopyPlan> {
        let mut state = BuildState::default();
        state.stack.push((key.clone(), false));
        let plan = self.build_steps(key, mappings, &mut state);
        state.stack.pop();

        let mut errors = state.errors;
        match errors.len() {
            0 => {
                debug!(pair = %plan.key, plans = plan.plans().len(), "Built copy plan");
                Ok(plan)
            }
            1 => Err(errors.remove(0)),
            count => {
                debug!(pair = %plan.key, errors = count, "Copy plan failed");
                Err(PlanError::IncompatiblePlan {
                    pair: plan.key.to_string(),
                    errors,
                })
            }
        }
    }

    fn build_steps(&self, key: PairKey, mappings: Vec<FieldMapping>, state: &mut BuildState) -> CopyPlan {
        let mut steps = Vec::with_capacity(mappings.len());

        for mapping in mappings {
            let action = match &mapping.source {
                None if mapping.destination.is_optional() || mapping.rule == MatchRule::Unexported => {
                    CopyAction::Skip
                }
                None => {
                    state.errors.push(PlanError::UnmatchedRequiredField {
                        structure: key.destination.to_string(),
                        field: mapping.destination.name.clone(),
                    });
                    continue;
                }
                Some(source) => {
                    let copy = if mapping.relation == TypeRelation::Incompatible {
                        Err(Failure::Incompatible)
                    } else {
                        self.value_copy(&source.field.ty, &mapping.destination.ty, false, state)
                    };
                    match copy {
                        Ok(copy) => CopyAction::Copy(copy),
                        Err(Failure::Incompatible) => {
                            state.errors.push(PlanError::TypeIncompatible {
                                structure: key.destination.to_string(),
                                field: mapping.destination.name.clone(),
                                source_type: source.field.ty.to_string(),
                                destination_type: mapping.destination.ty.to_string(),
                            });
                            continue;
                        }
                        Err(Failure::Reported) => continue,
                    }
                }
            };
            steps.push(CopyStep { mapping, action });
        }

        CopyPlan { key, steps }
    }

    /// `indirect` is set once the source value sits behind a pointer, slice
    /// or map relative to the struct being built
    fn value_copy(
        &self,
        source: &FieldType,
        destination: &FieldType,
        indirect: bool,
        state: &mut BuildState,
    ) -> std::result::Result<ValueCopy, Failure> {
        if let (FieldType::Named(source_ref), FieldType::Named(destination_ref)) = (source, destination) {
            if let (Some(source_struct), Some(destination_struct)) = (
                self.index.get_struct(source_ref),
                self.index.get_struct(destination_ref),
            ) {
                let key = PairKey::new(
                    self.index.canonical(source_ref),
                    self.index.canonical(destination_ref),
                );
                return self
                    .nested(key, source_struct, destination_struct, indirect, state)
                    .map(ValueCopy::Struct);
            }
        }

        let copy = match (source, destination) {
            (FieldType::Pointer(s), FieldType::Pointer(d)) => {
                ValueCopy::Pointer(Box::new(self.value_copy(s, d, true, state)?))
            }
            (FieldType::Slice(s), FieldType::Slice(d)) => {
                ValueCopy::Elements(Box::new(self.value_copy(s, d, true, state)?))
            }
            (FieldType::Array(n, s), FieldType::Array(m, d)) if n == m => {
                match self.value_copy(s, d, indirect, state)? {
                    // Go arrays of plain values copy on assignment
                    ValueCopy::Assign => ValueCopy::Assign,
                    inner => ValueCopy::Elements(Box::new(inner)),
                }
            }
            (FieldType::Map(sk, sv), FieldType::Map(dk, dv)) => ValueCopy::Entries {
                key: Box::new(self.value_copy(sk, dk, true, state)?),
                value: Box::new(self.value_copy(sv, dv, true, state)?),
            },
            (_, FieldType::Interface) => ValueCopy::Assign,
            (FieldType::Pointer(s), d) => ValueCopy::Deref(Box::new(self.value_copy(s, d, true, state)?)),
            (s, FieldType::Pointer(d)) => {
                ValueCopy::AddressOf(Box::new(self.value_copy(s, d, indirect, state)?))
            }
            _ => match relate(self.index, source, destination) {
                TypeRelation::Identical => ValueCopy::Assign,
                TypeRelation::Compatible { .. } => ValueCopy::Convert(destination.clone()),
                TypeRelation::Incompatible => return Err(Failure::Incompatible),
            },
        };
        Ok(copy)
    }

    fn nested(
        &self,
        key: PairKey,
        source: &StructDescriptor,
        destination: &StructDescriptor,
        indirect: bool,
        state: &mut BuildState,
    ) -> std::result::Result<PlanLink, Failure> {
        if let Some(position) = state.stack.iter().position(|(entry, _)| *entry == key) {
            let through_indirection =
                indirect || state.stack[position + 1..].iter().any(|(_, via)| *via);
            if through_indirection {
                return Ok(PlanLink::Recursive(key));
            }

            let mut path: Vec<String> = state.stack[position..]
                .iter()
                .map(|(entry, _)| entry.source.to_string())
                .collect();
            path.push(key.source.to_string());
            state.errors.push(PlanError::CyclicStructure { path });
            return Err(Failure::Reported);
        }

        if let Some(plan) = state.built.get(&key) {
            return Ok(PlanLink::Inline(Arc::clone(plan)));
        }
        if state.failed.contains(&key) {
            return Err(Failure::Reported);
        }

        let mappings = self.matcher.match_structs(source, destination);
        let errors_before = state.errors.len();
        state.stack.push((key.clone(), indirect));
        let plan = self.build_steps(key.clone(), mappings, state);
        state.stack.pop();

        if state.errors.len() > errors_before {
            state.failed.insert(key);
            return Err(Failure::Reported);
        }

        let plan = Arc::new(plan);
        state.built.insert(key, Arc::clone(&plan));
        Ok(PlanLink::Inline(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AliasDescriptor, FieldDescriptor, TypeDecl};

    fn field(name: &str, ty: &str) -> FieldDescriptor {
        FieldDescriptor::parse(name, ty).unwrap()
    }

    fn plan(decls: Vec<TypeDecl>, source: &str, destination: &str) -> Result<CopyPlan> {
        let index = TypeIndex::from_decls(decls).unwrap();
        let options = CopyOptions::default();
        PlanBuilder::new(&index, &options).plan(&TypeRef::parse(source), &TypeRef::parse(destination))
    }

    fn user_pair(destination_fields: Vec<FieldDescriptor>) -> Vec<TypeDecl> {
        let source = StructDescriptor::new("", "User")
            .with_field(field("Name", "string"))
            .with_field(field("Age", "int"));
        let destination = destination_fields
            .into_iter()
            .fold(StructDescriptor::new("", "UserDTO"), StructDescriptor::with_field);
        vec![source.into(), destination.into()]
    }

    #[test]
    fn test_lossy_numeric_field_is_copied() {
        let plan = plan(
            user_pair(vec![field("Name", "string"), field("Age", "int32")]),
            "User",
            "UserDTO",
        )
        .unwrap();

        assert_eq!(plan.steps.len(), 2);
        let age = plan.step("Age").unwrap();
        assert_eq!(age.mapping.rule, MatchRule::ExactName);
        assert!(age.mapping.is_lossy());
        assert_eq!(
            age.action,
            CopyAction::Copy(ValueCopy::Convert("int32".parse().unwrap()))
        );
        assert_eq!(plan.step("Name").unwrap().action, CopyAction::Copy(ValueCopy::Assign));
        assert_eq!(plan.lossy_fields().collect::<Vec<_>>(), vec!["Age"]);
    }

    #[test]
    fn test_unmatched_required_field() {
        let error = plan(
            user_pair(vec![field("Name", "string"), field("Email", "string")]),
            "User",
            "UserDTO",
        )
        .unwrap_err();

        assert_eq!(
            error,
            PlanError::UnmatchedRequiredField {
                structure: "UserDTO".to_string(),
                field: "Email".to_string(),
            }
        );
    }

    #[test]
    fn test_unmatched_optional_fields_are_skipped() {
        let plan = plan(
            user_pair(vec![
                field("Name", "string"),
                field("Nickname", "*string"),
                field("Note", "string").with_tag("json", "note,omitempty"),
            ]),
            "User",
            "UserDTO",
        )
        .unwrap();

        assert_eq!(plan.skipped_fields().collect::<Vec<_>>(), vec!["Nickname", "Note"]);
    }

    #[test]
    fn test_errors_are_collected_across_siblings() {
        let error = plan(
            user_pair(vec![
                field("Name", "int"),
                field("Email", "string"),
                field("Age", "int64"),
            ]),
            "User",
            "UserDTO",
        )
        .unwrap_err();

        let errors = error.errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], PlanError::TypeIncompatible { field, .. } if field == "Name"));
        assert!(matches!(errors[1], PlanError::UnmatchedRequiredField { field, .. } if field == "Email"));
        assert!(error.to_string().starts_with("No copy plan for User -> UserDTO"));
    }

    #[test]
    fn test_unknown_root_type() {
        let error = plan(user_pair(vec![]), "User", "Missing").unwrap_err();
        assert_eq!(error, PlanError::UnknownType("Missing".to_string()));
    }

    #[test]
    fn test_nested_plans_are_shared() {
        let decls: Vec<TypeDecl> = vec![
            StructDescriptor::new("", "Address")
                .with_field(field("Street", "string"))
                .into(),
            StructDescriptor::new("", "AddressDTO")
                .with_field(field("Street", "string"))
                .into(),
            StructDescriptor::new("", "Order")
                .with_field(field("Billing", "Address"))
                .with_field(field("Shipping", "*Address"))
                .with_field(field("History", "[]Address"))
                .into(),
            StructDescriptor::new("", "OrderDTO")
                .with_field(field("Billing", "AddressDTO"))
                .with_field(field("Shipping", "*AddressDTO"))
                .with_field(field("History", "[]AddressDTO"))
                .into(),
        ];
        let plan = plan(decls, "Order", "OrderDTO").unwrap();

        let CopyAction::Copy(ValueCopy::Struct(PlanLink::Inline(billing))) =
            &plan.step("Billing").unwrap().action
        else {
            panic!("expected nested plan");
        };
        let CopyAction::Copy(ValueCopy::Pointer(shipping)) = &plan.step("Shipping").unwrap().action
        else {
            panic!("expected pointer copy");
        };
        let ValueCopy::Struct(PlanLink::Inline(shipping)) = shipping.as_ref() else {
            panic!("expected nested plan");
        };
        assert!(Arc::ptr_eq(billing, shipping));
        assert!(matches!(
            &plan.step("History").unwrap().action,
            CopyAction::Copy(ValueCopy::Elements(inner)) if matches!(inner.as_ref(), ValueCopy::Struct(_))
        ));

        let keys: Vec<String> = plan.plans().iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, vec!["Order -> OrderDTO", "Address -> AddressDTO"]);
    }

    #[test]
    fn test_self_reference_through_pointer() {
        let decls: Vec<TypeDecl> = vec![
            StructDescriptor::new("", "Node")
                .with_field(field("Value", "int"))
                .with_field(field("Next", "*Node"))
                .into(),
            StructDescriptor::new("", "NodeDTO")
                .with_field(field("Value", "int"))
                .with_field(field("Next", "*NodeDTO"))
                .into(),
        ];
        let plan = plan(decls, "Node", "NodeDTO").unwrap();

        let expected = ValueCopy::Pointer(Box::new(ValueCopy::Struct(PlanLink::Recursive(
            plan.key.clone(),
        ))));
        assert_eq!(plan.step("Next").unwrap().action, CopyAction::Copy(expected));
        assert_eq!(plan.plans().len(), 1);
    }

    #[test]
    fn test_direct_self_reference_is_cyclic() {
        let decls: Vec<TypeDecl> = vec![
            StructDescriptor::new("", "Node")
                .with_field(field("Value", "int"))
                .with_field(field("Next", "Node"))
                .into(),
            StructDescriptor::new("", "NodeDTO")
                .with_field(field("Value", "int"))
                .into(),
        ];
        let error = plan(decls, "Node", "NodeDTO").unwrap_err();
        assert_eq!(
            error,
            PlanError::CyclicStructure {
                path: vec!["Node".to_string(), "Node".to_string()]
            }
        );
    }

    #[test]
    fn test_pointer_and_value_conversions() {
        let decls: Vec<TypeDecl> = vec![
            StructDescriptor::new("", "Profile")
                .with_field(field("Bio", "string"))
                .with_field(field("Score", "*int"))
                .with_field(field("Tags", "[3]string"))
                .into(),
            StructDescriptor::new("", "ProfileDTO")
                .with_field(field("Bio", "*string"))
                .with_field(field("Score", "int64"))
                .with_field(field("Tags", "[3]string"))
                .into(),
        ];
        let plan = plan(decls, "Profile", "ProfileDTO").unwrap();

        assert_eq!(
            plan.step("Bio").unwrap().action,
            CopyAction::Copy(ValueCopy::AddressOf(Box::new(ValueCopy::Assign)))
        );
        assert_eq!(
            plan.step("Score").unwrap().action,
            CopyAction::Copy(ValueCopy::Deref(Box::new(ValueCopy::Convert(
                "int64".parse().unwrap()
            ))))
        );
        assert_eq!(plan.step("Tags").unwrap().action, CopyAction::Copy(ValueCopy::Assign));
    }

    #[test]
    fn test_defined_struct_type_keeps_its_name() {
        let decls: Vec<TypeDecl> = vec![
            StructDescriptor::new("", "User")
                .with_field(field("Name", "string"))
                .into(),
            AliasDescriptor::new("", "Admin", "User".parse().unwrap()).into(),
            StructDescriptor::new("", "Team")
                .with_field(field("Lead", "Admin"))
                .into(),
            StructDescriptor::new("", "TeamDTO")
                .with_field(field("Lead", "User"))
                .into(),
        ];
        let plan = plan(decls, "Team", "TeamDTO").unwrap();

        let nested = plan.plans()[1];
        assert_eq!(nested.key.to_string(), "Admin -> User");
        assert_eq!(nested.steps.len(), 1);
    }

    #[test]
    fn test_failed_nested_pair_reports_once() {
        let decls: Vec<TypeDecl> = vec![
            StructDescriptor::new("", "Address")
                .with_field(field("Street", "string"))
                .into(),
            StructDescriptor::new("", "AddressDTO")
                .with_field(field("Street", "string"))
                .with_field(field("Zip", "string"))
                .into(),
            StructDescriptor::new("", "Order")
                .with_field(field("Billing", "Address"))
                .with_field(field("Shipping", "Address"))
                .into(),
            StructDescriptor::new("", "OrderDTO")
                .with_field(field("Billing", "AddressDTO"))
                .with_field(field("Shipping", "AddressDTO"))
                .into(),
        ];
        let error = plan(decls, "Order", "OrderDTO").unwrap_err();
        assert_eq!(
            error,
            PlanError::UnmatchedRequiredField {
                structure: "AddressDTO".to_string(),
                field: "Zip".to_string(),
            }
        );
    }
}
