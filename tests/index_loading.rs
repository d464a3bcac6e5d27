use anyhow::Result;
use gostructcopy::config::CopyOptions;
use gostructcopy::model::{TypeIndex, TypeRef};
use gostructcopy::{expand_type, generate_source};
use std::fs;
use tempfile::TempDir;

const MODEL_TYPES: &str = r#"{
  "types": [
    {
      "kind": "struct",
      "package": "github.com/acme/model",
      "name": "User",
      "fields": [
        { "name": "ID", "type": "UserID" },
        { "name": "FullName", "type": "string", "tags": "`json:\"name\"`" },
        { "name": "Password", "type": "string", "tags": { "copy": "-" } },
        { "name": "Created", "type": "time.Time" }
      ]
    },
    { "kind": "alias", "package": "github.com/acme/model", "name": "UserID", "underlying": "int64" }
  ]
}"#;

const DTO_TYPES: &str = r#"[
  {
    "kind": "struct",
    "package": "github.com/acme/dto",
    "name": "User",
    "fields": [
      { "name": "ID", "type": "int64" },
      { "name": "Name", "type": "string", "tags": { "json": "name" } },
      { "name": "Password", "type": "*string" }
    ]
  }
]"#;

#[test]
fn test_load_directory_and_generate() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("model.json"), MODEL_TYPES)?;
    let nested = temp_dir.path().join("dto");
    fs::create_dir(&nested)?;
    fs::write(nested.join("types.json"), DTO_TYPES)?;
    fs::write(temp_dir.path().join("README.md"), "not a descriptor")?;

    let index = TypeIndex::load(temp_dir.path())?;
    assert_eq!(index.len(), 3);

    let text = generate_source(
        &index,
        &TypeRef::parse("model.User"),
        &TypeRef::parse("dto.User"),
        &CopyOptions::default(),
    )?;
    assert!(text.contains("func CopyUserToUser(dst *dto.User, src *model.User) {"));
    assert!(text.contains("\tdst.ID = int64(src.ID)\n"));
    assert!(text.contains("\tdst.Name = src.FullName\n"));
    assert!(text.contains("\t// Password: no matching source field\n"));
    Ok(())
}

#[test]
fn test_load_single_file_and_expand() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("model.json");
    fs::write(&path, MODEL_TYPES)?;

    let index = TypeIndex::load(&path)?;
    let text = expand_type(&index, &TypeRef::parse("model.User"))?;
    assert_eq!(
        text,
        "type User struct {\n\tID UserID\n\tFullName string `json:\"name\"`\n\tPassword string\n\tCreated time.Time\n}\n\n\
         type UserID int64\n"
    );
    Ok(())
}

#[test]
fn test_invalid_descriptors_are_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("broken.json");
    fs::write(&path, r#"{ "kind": "struct", "name": "User", "fields": [ { "name": "A", "type": "map[string" } ] }"#)?;
    assert!(TypeIndex::load(&path).is_err());

    assert!(TypeIndex::load(temp_dir.path().join("missing.json")).is_err());

    let duplicate = format!("[{0}, {0}]", r#"{ "kind": "struct", "name": "User" }"#);
    assert!(TypeIndex::from_json_str(&duplicate).is_err());
    Ok(())
}
