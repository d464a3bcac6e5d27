//! Entry points that run matching, planning and emission in one call

use tracing::info;

use crate::config::CopyOptions;
use crate::core::{Result, Timer};
use crate::emit::{Artifact, Emitter, GoWriter};
use crate::expand;
use crate::model::{TypeIndex, TypeRef};
use crate::plan::{CopyPlan, PlanBuilder};

/// Match `source` against `destination` and build the copy plan
pub fn plan(
    index: &TypeIndex,
    source: &TypeRef,
    destination: &TypeRef,
    options: &CopyOptions,
) -> Result<CopyPlan> {
    let timer = Timer::start_debug(format!("plan {} -> {}", source, destination));
    let plan = PlanBuilder::new(index, options).plan(source, destination)?;
    timer.stop_with_message(&format!("{} nested plans", plan.plans().len()));
    Ok(plan)
}

/// Plan and emit a copy from `source` into `destination` in the configured
/// target
pub fn generate(
    index: &TypeIndex,
    source: &TypeRef,
    destination: &TypeRef,
    options: &CopyOptions,
) -> Result<Artifact> {
    let timer = Timer::start(format!("generate {} -> {}", source, destination));
    let plan = plan(index, source, destination, options)?;

    let lossy: Vec<&str> = plan.lossy_fields().collect();
    if !lossy.is_empty() {
        info!(pair = %plan.key, fields = ?lossy, "Copy narrows or dereferences values");
    }

    let artifact = Emitter::new(index, options).emit(&plan)?;
    timer.stop();
    Ok(artifact)
}

/// Generated Go source regardless of the configured target
pub fn generate_source(
    index: &TypeIndex,
    source: &TypeRef,
    destination: &TypeRef,
    options: &CopyOptions,
) -> Result<String> {
    let plan = plan(index, source, destination, options)?;
    Ok(GoWriter::new(index, options).write(&plan)?)
}

/// Self-contained Go definitions of `root` and everything it references
pub fn expand_type(index: &TypeIndex, root: &TypeRef) -> Result<String> {
    let text = crate::time_debug!(format!("expand {}", root), { expand::expand(index, root) })?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::core::StructCopyError;
    use crate::model::{FieldDescriptor, StructDescriptor};
    use crate::plan::PlanError;
    use serde_json::json;

    fn field(name: &str, ty: &str) -> FieldDescriptor {
        FieldDescriptor::parse(name, ty).unwrap()
    }

    fn index() -> TypeIndex {
        TypeIndex::from_decls([
            StructDescriptor::new("", "User")
                .with_field(field("Name", "string"))
                .with_field(field("Age", "int")),
            StructDescriptor::new("", "UserDTO")
                .with_field(field("Name", "string"))
                .with_field(field("Age", "int32")),
            StructDescriptor::new("", "Account")
                .with_field(field("Name", "string"))
                .with_field(field("Email", "string")),
        ])
        .unwrap()
    }

    #[test]
    fn test_generate_source_text() {
        let index = index();
        let artifact = generate(
            &index,
            &TypeRef::local("User"),
            &TypeRef::local("UserDTO"),
            &CopyOptions::default(),
        )
        .unwrap();

        assert_eq!(artifact.target(), Target::SourceText);
        let text = artifact.as_source_text().unwrap();
        assert!(text.contains("func CopyUserToUserDTO(dst *UserDTO, src *User) {"));
        assert!(text.contains("\tdst.Age = int32(src.Age)\n"));
    }

    #[test]
    fn test_generate_callable() {
        let index = index();
        let options = CopyOptions {
            target: Target::Callable,
            ..CopyOptions::default()
        };
        let artifact = generate(
            &index,
            &TypeRef::local("User"),
            &TypeRef::local("UserDTO"),
            &options,
        )
        .unwrap();

        let operation = artifact.as_callable().unwrap();
        let copied = operation.apply(&json!({"Name": "Ann", "Age": 41})).unwrap();
        assert_eq!(copied, json!({"Name": "Ann", "Age": 41}));
    }

    #[test]
    fn test_generate_source_ignores_callable_target() {
        let index = index();
        let options = CopyOptions {
            target: Target::Callable,
            ..CopyOptions::default()
        };
        let text = generate_source(
            &index,
            &TypeRef::local("User"),
            &TypeRef::local("UserDTO"),
            &options,
        )
        .unwrap();
        assert!(text.starts_with("// CopyUserToUserDTO copies src into dst.\n"));
    }

    #[test]
    fn test_plan_errors_surface_as_plan_errors() {
        let index = index();
        let error = generate(
            &index,
            &TypeRef::local("User"),
            &TypeRef::local("Account"),
            &CopyOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(
            error.as_plan_error(),
            Some(PlanError::UnmatchedRequiredField { field, .. }) if field == "Email"
        ));

        let error = plan(
            &index,
            &TypeRef::local("Missing"),
            &TypeRef::local("UserDTO"),
            &CopyOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(error, StructCopyError::Plan(PlanError::UnknownType(_))));
    }

    #[test]
    fn test_expand_type() {
        let index = index();
        assert_eq!(
            expand_type(&index, &TypeRef::local("User")).unwrap(),
            "type User struct {\n\tName string\n\tAge int\n}\n"
        );
        assert!(matches!(
            expand_type(&index, &TypeRef::local("Missing")),
            Err(StructCopyError::Expand(_))
        ));
    }
}
