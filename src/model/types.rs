use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::error::{ModelError, Result};

/// Identifier or package-qualified identifier, e.g. `Name`, `time.Time`,
/// `github.com/acme/dto.User`
static TYPE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:[./-][A-Za-z0-9_]+)*").expect("type name pattern")
});

/// Reference to a declared type: package import path plus type name.
///
/// An empty package denotes the local package of whoever holds the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(default)]
    pub package: String,
    pub name: String,
}

impl TypeRef {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    /// Parse `Name`, `pkg.Name` or `import/path/pkg.Name`
    pub fn parse(text: &str) -> Self {
        let tail_start = text.rfind('/').map(|i| i + 1).unwrap_or(0);
        match text[tail_start..].rfind('.') {
            Some(dot) => {
                let dot = tail_start + dot;
                Self::new(&text[..dot], &text[dot + 1..])
            }
            None => Self::local(text),
        }
    }

    pub fn is_local(&self) -> bool {
        self.package.is_empty()
    }

    /// Go package name used to qualify this type in source text
    pub fn package_name(&self) -> &str {
        package_name(&self.package)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package_name(), self.name)
        }
    }
}

/// Derive the Go package name from an import path.
///
/// `github.com/acme/dto` -> `dto`, `gopkg.in/yaml.v3` -> `yaml`,
/// `github.com/redis/go-redis/v9` -> `redis`.
pub fn package_name(import_path: &str) -> &str {
    let mut segments = import_path.rsplit('/');
    let mut last = segments.next().unwrap_or(import_path);
    if is_major_version(last) {
        last = segments.next().unwrap_or(last);
    }
    let last = last.split('.').next().unwrap_or(last);
    last.rsplit('-').next().unwrap_or(last)
}

/// Upper-case the first character: `dto` -> `Dto`
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_major_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Go predeclared basic types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Byte,
    Rune,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "bool" => Self::Bool,
            "string" => Self::String,
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "uintptr" => Self::Uintptr,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "complex64" => Self::Complex64,
            "complex128" => Self::Complex128,
            "byte" => Self::Byte,
            "rune" => Self::Rune,
            _ => return None,
        };
        Some(primitive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uintptr => "uintptr",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::Byte => "byte",
            Self::Rune => "rune",
        }
    }

    /// `byte` and `rune` are aliases of `uint8` and `int32`
    pub fn canonical(self) -> Self {
        match self {
            Self::Byte => Self::Uint8,
            Self::Rune => Self::Int32,
            other => other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Bool | Self::String)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_numeric() && !self.is_float() && !self.is_complex()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self.canonical(),
            Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    /// Bit width of integer types; `int`, `uint` and `uintptr` are 64-bit
    pub fn bits(&self) -> u32 {
        match self.canonical() {
            Self::Int8 | Self::Uint8 => 8,
            Self::Int16 | Self::Uint16 => 16,
            Self::Int32 | Self::Uint32 | Self::Float32 => 32,
            Self::Complex128 => 128,
            _ => 64,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a field.
///
/// `Named` covers both nested structs and defined/alias types; which one it is
/// gets decided by the [`TypeIndex`](super::index::TypeIndex). Named types the
/// index does not know about (`time.Time`, `uuid.UUID`) are external and only
/// ever copied by assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Primitive(Primitive),
    Named(TypeRef),
    Pointer(Box<FieldType>),
    Slice(Box<FieldType>),
    Array(usize, Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Interface,
    /// func, chan, anonymous struct and other types kept as written
    Opaque(String),
}

impl FieldType {
    pub fn primitive(primitive: Primitive) -> Self {
        Self::Primitive(primitive)
    }

    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named(TypeRef::new(package, name))
    }

    pub fn pointer(inner: FieldType) -> Self {
        Self::Pointer(Box::new(inner))
    }

    pub fn slice(inner: FieldType) -> Self {
        Self::Slice(Box::new(inner))
    }

    pub fn array(len: usize, inner: FieldType) -> Self {
        Self::Array(len, Box::new(inner))
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Types whose zero value is nil
    pub fn is_nilable(&self) -> bool {
        matches!(
            self,
            Self::Pointer(_) | Self::Slice(_) | Self::Map(_, _) | Self::Interface | Self::Opaque(_)
        )
    }

    /// Name an embedded field of this type gets: `Base` for `Base`, `*pkg.Base`
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Self::Named(type_ref) => Some(&type_ref.name),
            Self::Pointer(inner) => inner.base_name(),
            Self::Primitive(primitive) => Some(primitive.as_str()),
            _ => None,
        }
    }

    /// Give unqualified named references the package of their declaring type
    pub fn qualify(&mut self, package: &str) {
        match self {
            Self::Named(type_ref) if type_ref.package.is_empty() => {
                type_ref.package = package.to_string();
            }
            Self::Pointer(inner) | Self::Slice(inner) | Self::Array(_, inner) => {
                inner.qualify(package)
            }
            Self::Map(key, value) => {
                key.qualify(package);
                value.qualify(package);
            }
            _ => {}
        }
    }

    /// Visit every named reference in this type
    pub fn visit_named<F: FnMut(&TypeRef)>(&self, visit: &mut F) {
        match self {
            Self::Named(type_ref) => visit(type_ref),
            Self::Pointer(inner) | Self::Slice(inner) | Self::Array(_, inner) => {
                inner.visit_named(visit)
            }
            Self::Map(key, value) => {
                key.visit_named(visit);
                value.visit_named(visit);
            }
            _ => {}
        }
    }

    /// Render as Go type syntax, letting the caller spell named references
    pub fn render_with<F: FnMut(&TypeRef) -> String>(&self, name: &mut F) -> String {
        match self {
            Self::Primitive(primitive) => primitive.as_str().to_string(),
            Self::Named(type_ref) => name(type_ref),
            Self::Pointer(inner) => format!("*{}", inner.render_with(name)),
            Self::Slice(inner) => format!("[]{}", inner.render_with(name)),
            Self::Array(len, inner) => format!("[{}]{}", len, inner.render_with(name)),
            Self::Map(key, value) => {
                let key = key.render_with(name);
                format!("map[{}]{}", key, value.render_with(name))
            }
            Self::Interface => "interface{}".to_string(),
            Self::Opaque(text) => text.clone(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(&mut |type_ref: &TypeRef| type_ref.to_string()))
    }
}

impl FromStr for FieldType {
    type Err = ModelError;

    fn from_str(text: &str) -> Result<Self> {
        let (ty, rest) = parse_type(text, text)?;
        if !rest.trim().is_empty() {
            return Err(ModelError::invalid_type(
                text,
                format!("unexpected trailing input `{}`", rest.trim()),
            ));
        }
        Ok(ty)
    }
}

impl TryFrom<String> for FieldType {
    type Error = ModelError;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        ty.to_string()
    }
}

impl From<Primitive> for FieldType {
    fn from(primitive: Primitive) -> Self {
        Self::Primitive(primitive)
    }
}

/// Prefixes of types that are kept verbatim until the end of the input
const OPAQUE_PREFIXES: &[&str] = &[
    "func(", "func (", "chan ", "chan<-", "<-chan", "struct{", "struct {", "interface",
];

/// Recursive descent over Go type syntax; returns the parsed type and the
/// unconsumed remainder
fn parse_type<'a>(input: &'a str, text: &str) -> Result<(FieldType, &'a str)> {
    let rest = input.trim_start();

    if let Some(inner) = rest.strip_prefix('*') {
        let (ty, rest) = parse_type(inner, text)?;
        return Ok((FieldType::pointer(ty), rest));
    }

    if let Some(inner) = rest.strip_prefix("[]") {
        let (ty, rest) = parse_type(inner, text)?;
        return Ok((FieldType::slice(ty), rest));
    }

    if let Some(inner) = rest.strip_prefix("map[") {
        let (key, rest) = parse_type(inner, text)?;
        let rest = rest
            .trim_start()
            .strip_prefix(']')
            .ok_or_else(|| ModelError::invalid_type(text, "expected `]` after map key"))?;
        let (value, rest) = parse_type(rest, text)?;
        return Ok((FieldType::map(key, value), rest));
    }

    if let Some(inner) = rest.strip_prefix('[') {
        let end = inner
            .find(']')
            .ok_or_else(|| ModelError::invalid_type(text, "unterminated array length"))?;
        let len = inner[..end].trim().parse::<usize>().map_err(|_| {
            ModelError::invalid_type(text, "array length must be an integer literal")
        })?;
        let (ty, rest) = parse_type(&inner[end + 1..], text)?;
        return Ok((FieldType::array(len, ty), rest));
    }

    for empty_interface in ["interface{}", "interface {}"] {
        if let Some(rest) = rest.strip_prefix(empty_interface) {
            return Ok((FieldType::Interface, rest));
        }
    }

    if OPAQUE_PREFIXES.iter().any(|prefix| rest.starts_with(prefix)) {
        return Ok((FieldType::Opaque(rest.trim_end().to_string()), ""));
    }

    let word = TYPE_NAME
        .find(rest)
        .ok_or_else(|| ModelError::invalid_type(text, "expected a type"))?
        .as_str();
    let rest = &rest[word.len()..];
    if rest.starts_with('[') {
        return Err(ModelError::invalid_type(
            text,
            "generic type instantiations are not supported",
        ));
    }

    let ty = match word {
        "any" => FieldType::Interface,
        "error" => FieldType::Opaque(word.to_string()),
        _ => match Primitive::from_name(word) {
            Some(primitive) => FieldType::Primitive(primitive),
            None => FieldType::Named(TypeRef::parse(word)),
        },
    };
    Ok((ty, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> FieldType {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_primitives_and_named() {
        assert_eq!(parse("int32"), FieldType::Primitive(Primitive::Int32));
        assert_eq!(parse("Address"), FieldType::named("", "Address"));
        assert_eq!(parse("time.Time"), FieldType::named("time", "Time"));
        assert_eq!(
            parse("github.com/acme/dto.User"),
            FieldType::named("github.com/acme/dto", "User")
        );
        assert_eq!(parse("any"), FieldType::Interface);
        assert_eq!(parse("interface{}"), FieldType::Interface);
    }

    #[test]
    fn test_parse_composite_types() {
        assert_eq!(
            parse("[]*Address"),
            FieldType::slice(FieldType::pointer(FieldType::named("", "Address")))
        );
        assert_eq!(
            parse("map[string][]int"),
            FieldType::map(
                FieldType::Primitive(Primitive::String),
                FieldType::slice(FieldType::Primitive(Primitive::Int))
            )
        );
        assert_eq!(
            parse("[4]byte"),
            FieldType::array(4, FieldType::Primitive(Primitive::Byte))
        );
        assert_eq!(
            parse("map[NormalizedName]*Flag"),
            FieldType::map(
                FieldType::named("", "NormalizedName"),
                FieldType::pointer(FieldType::named("", "Flag"))
            )
        );
    }

    #[test]
    fn test_parse_opaque_types() {
        assert_eq!(parse("func()"), FieldType::Opaque("func()".to_string()));
        assert_eq!(
            parse("map[string]func(int) error"),
            FieldType::map(
                FieldType::Primitive(Primitive::String),
                FieldType::Opaque("func(int) error".to_string())
            )
        );
        assert_eq!(parse("chan int"), FieldType::Opaque("chan int".to_string()));
        // identifiers that merely start like a keyword are still names
        assert_eq!(parse("channel"), FieldType::named("", "channel"));
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<FieldType>().is_err());
        assert!("map[string".parse::<FieldType>().is_err());
        assert!("[n]int".parse::<FieldType>().is_err());
        assert!("List[int]".parse::<FieldType>().is_err());
        assert!("int int".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["[]*Address", "map[string]int", "[3]float64", "*time.Time", "func()"] {
            assert_eq!(parse(text).to_string(), text);
        }
        assert_eq!(parse("any").to_string(), "interface{}");
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("github.com/acme/dto"), "dto");
        assert_eq!(package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(package_name("github.com/redis/go-redis/v9"), "redis");
        assert_eq!(package_name("time"), "time");
        assert_eq!(
            FieldType::named("github.com/acme/dto", "User").to_string(),
            "dto.User"
        );
        assert_eq!(capitalize("dto"), "Dto");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_qualify_only_touches_local_refs() {
        let mut ty = parse("map[Key]*time.Time");
        ty.qualify("example.com/app");
        assert_eq!(
            ty,
            FieldType::map(
                FieldType::named("example.com/app", "Key"),
                FieldType::pointer(FieldType::named("time", "Time"))
            )
        );
    }

    #[test]
    fn test_nilable() {
        assert!(parse("*int").is_nilable());
        assert!(parse("[]int").is_nilable());
        assert!(parse("map[string]int").is_nilable());
        assert!(parse("any").is_nilable());
        assert!(!parse("[2]int").is_nilable());
        assert!(!parse("string").is_nilable());
        assert!(!parse("Address").is_nilable());
    }
}
