pub mod error;
pub mod index;
pub mod tags;
pub mod types;

pub use error::{ModelError, Result};
pub use index::TypeIndex;
pub use types::{capitalize, package_name, FieldType, Primitive, TypeRef};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag key whose `-` value excludes a field from copying
pub const COPY_TAG: &str = "copy";

/// A single field of a structure, as supplied by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: FieldType,

    /// Struct tag entries, e.g. `json` -> `nm,omitempty`
    #[serde(default, deserialize_with = "tags::deserialize_tags")]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub embedded: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            tags: BTreeMap::new(),
            embedded: false,
        }
    }

    /// Build a field from Go type syntax
    pub fn parse(name: impl Into<String>, ty: &str) -> Result<Self> {
        Ok(Self::new(name, ty.parse()?))
    }

    /// Embedded field; its name is the base name of its type
    pub fn embedded(ty: FieldType) -> Self {
        let name = ty.base_name().unwrap_or_default().to_string();
        Self {
            embedded: true,
            ..Self::new(name, ty)
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add every entry of a raw Go struct tag
    pub fn with_raw_tag(mut self, raw: &str) -> Self {
        self.tags.extend(tags::parse_struct_tag(raw));
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Alias declared under the given tag key
    pub fn tag_alias(&self, key: &str) -> Option<&str> {
        self.tag(key).and_then(tags::tag_name)
    }

    /// Go exports identifiers that start with an upper case letter
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }

    /// `copy:"-"` excludes the field from matching
    pub fn is_ignored(&self) -> bool {
        self.tag(COPY_TAG).is_some_and(|value| value.trim() == "-")
    }

    /// A destination field may stay at its zero value when it is nilable,
    /// ignored, or tagged `omitempty`/`optional`
    pub fn is_optional(&self) -> bool {
        self.ty.is_nilable()
            || self.is_ignored()
            || self.tags.values().any(|value| {
                tags::tag_options(value).any(|option| option == "omitempty" || option == "optional")
            })
    }
}

/// Ordered field set of a Go structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDescriptor {
    pub name: String,

    /// Import path of the declaring package; empty for the local package
    #[serde(default)]
    pub package: String,

    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(&self.package, &self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Defined non-struct type, e.g. `type UserID string`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDescriptor {
    pub name: String,

    #[serde(default)]
    pub package: String,

    pub underlying: FieldType,
}

impl AliasDescriptor {
    pub fn new(package: impl Into<String>, name: impl Into<String>, underlying: FieldType) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            underlying,
        }
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(&self.package, &self.name)
    }
}

/// A type declaration held by the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDecl {
    Struct(StructDescriptor),
    Alias(AliasDescriptor),
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Struct(decl) => &decl.name,
            TypeDecl::Alias(decl) => &decl.name,
        }
    }

    pub fn package(&self) -> &str {
        match self {
            TypeDecl::Struct(decl) => &decl.package,
            TypeDecl::Alias(decl) => &decl.package,
        }
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.package(), self.name())
    }

    pub fn as_struct(&self) -> Option<&StructDescriptor> {
        match self {
            TypeDecl::Struct(decl) => Some(decl),
            TypeDecl::Alias(_) => None,
        }
    }

    pub fn as_alias(&self) -> Option<&AliasDescriptor> {
        match self {
            TypeDecl::Alias(decl) => Some(decl),
            TypeDecl::Struct(_) => None,
        }
    }

    /// Resolve unqualified references against the declaring package
    pub(crate) fn qualify(&mut self) {
        match self {
            TypeDecl::Struct(decl) => {
                for field in &mut decl.fields {
                    field.ty.qualify(&decl.package);
                }
            }
            TypeDecl::Alias(decl) => decl.underlying.qualify(&decl.package),
        }
    }
}

impl From<StructDescriptor> for TypeDecl {
    fn from(decl: StructDescriptor) -> Self {
        TypeDecl::Struct(decl)
    }
}

impl From<AliasDescriptor> for TypeDecl {
    fn from(decl: AliasDescriptor) -> Self {
        TypeDecl::Alias(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_and_optional_fields() {
        let email = FieldDescriptor::parse("Email", "string").unwrap();
        assert!(!email.is_optional());

        let nickname = FieldDescriptor::parse("Nickname", "*string").unwrap();
        assert!(nickname.is_optional());

        let note = FieldDescriptor::parse("Note", "string")
            .unwrap()
            .with_tag("json", "note,omitempty");
        assert!(note.is_optional());

        let secret = FieldDescriptor::parse("Secret", "string")
            .unwrap()
            .with_tag(COPY_TAG, "-");
        assert!(secret.is_ignored());
        assert!(secret.is_optional());
    }

    #[test]
    fn test_embedded_field_takes_type_name() {
        let field = FieldDescriptor::embedded("*model.Base".parse().unwrap());
        assert_eq!(field.name, "Base");
        assert!(field.embedded);
    }

    #[test]
    fn test_tag_alias() {
        let field = FieldDescriptor::parse("FullName", "string")
            .unwrap()
            .with_raw_tag(r#"`json:"nm,omitempty" copy:"-"`"#);
        assert_eq!(field.tag_alias("json"), Some("nm"));
        assert_eq!(field.tag_alias("copy"), None);
        assert_eq!(field.tag_alias("db"), None);
    }

    #[test]
    fn test_deserialize_struct_descriptor() {
        let json = r#"{
            "kind": "struct",
            "name": "User",
            "package": "example.com/app/model",
            "fields": [
                {"name": "Name", "type": "string", "tags": "`json:\"name\"`"},
                {"name": "Address", "type": "*Address", "tags": {"copy": "addr"}},
                {"name": "Base", "type": "Base", "embedded": true}
            ]
        }"#;
        let decl: TypeDecl = serde_json::from_str(json).unwrap();
        let user = decl.as_struct().unwrap();
        assert_eq!(user.fields.len(), 3);
        assert_eq!(user.fields[0].tag("json"), Some("name"));
        assert_eq!(user.fields[1].tag_alias("copy"), Some("addr"));
        assert!(user.fields[2].embedded);
    }
}
