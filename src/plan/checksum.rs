use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

use super::CopyPlan;

/// Calculate a checksum over a plan and every nested plan it reaches.
/// Uses FxHasher for fast, deterministic hashing
pub fn calculate_checksum(plan: &CopyPlan) -> u64 {
    let mut hasher = FxHasher::default();

    for plan in plan.plans() {
        plan.hash(&mut hasher);
    }

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CopyOptions;
    use crate::model::{FieldDescriptor, StructDescriptor, TypeIndex, TypeRef};
    use crate::plan::PlanBuilder;

    fn checksum(age_type: &str) -> u64 {
        let index = TypeIndex::from_decls([
            StructDescriptor::new("", "User")
                .with_field(FieldDescriptor::parse("Name", "string").unwrap())
                .with_field(FieldDescriptor::parse("Age", "int").unwrap()),
            StructDescriptor::new("", "UserDTO")
                .with_field(FieldDescriptor::parse("Name", "string").unwrap())
                .with_field(FieldDescriptor::parse("Age", age_type).unwrap()),
        ])
        .unwrap();
        let options = CopyOptions::default();
        let plan = PlanBuilder::new(&index, &options)
            .plan(&TypeRef::local("User"), &TypeRef::local("UserDTO"))
            .unwrap();
        calculate_checksum(&plan)
    }

    #[test]
    fn test_checksum_stable() {
        assert_eq!(
            checksum("int32"),
            checksum("int32"),
            "Checksum should be stable for same input"
        );
    }

    #[test]
    fn test_checksum_changes_with_field_type() {
        assert_ne!(
            checksum("int32"),
            checksum("int64"),
            "Checksum should change when a field type changes"
        );
    }
}
