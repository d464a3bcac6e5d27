use serde::Serialize;

use crate::model::{FieldType, Primitive, TypeIndex};

/// How a source field type relates to a destination field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "relation", rename_all = "kebab-case")]
pub enum TypeRelation {
    /// Same Go type; copied without conversion
    Identical,
    /// Copyable; `lossy` when the value has to be coerced on the way
    /// (numeric or defined-type conversion, dereference, interface erasure)
    Compatible { lossy: bool },
    /// Irreconcilable, e.g. struct vs primitive
    Incompatible,
}

impl TypeRelation {
    pub fn is_compatible(&self) -> bool {
        !matches!(self, TypeRelation::Incompatible)
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, TypeRelation::Compatible { lossy: true })
    }

    /// Same relation seen through a container or pointer on both sides
    fn converted(self) -> Self {
        match self {
            TypeRelation::Identical => TypeRelation::Compatible { lossy: false },
            other => other,
        }
    }

    fn lossy(self) -> Self {
        match self {
            TypeRelation::Incompatible => TypeRelation::Incompatible,
            _ => TypeRelation::Compatible { lossy: true },
        }
    }

    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (TypeRelation::Incompatible, _) | (_, TypeRelation::Incompatible) => {
                TypeRelation::Incompatible
            }
            (TypeRelation::Identical, TypeRelation::Identical) => TypeRelation::Identical,
            (a, b) => TypeRelation::Compatible {
                lossy: a.is_lossy() || b.is_lossy(),
            },
        }
    }
}

/// Go conversion between numeric types; complex only converts to complex
pub fn numeric_convertible(source: Primitive, destination: Primitive) -> bool {
    source.is_numeric() && destination.is_numeric() && source.is_complex() == destination.is_complex()
}

/// Type identity: `byte`/`uint8` and `rune`/`int32` are the same type, named
/// types are identical only when they resolve to the same declaration
pub fn identical(index: &TypeIndex, a: &FieldType, b: &FieldType) -> bool {
    match (a, b) {
        (FieldType::Primitive(x), FieldType::Primitive(y)) => x.canonical() == y.canonical(),
        (FieldType::Named(x), FieldType::Named(y)) => index.same_type(x, y),
        (FieldType::Pointer(x), FieldType::Pointer(y))
        | (FieldType::Slice(x), FieldType::Slice(y)) => identical(index, x, y),
        (FieldType::Array(n, x), FieldType::Array(m, y)) => n == m && identical(index, x, y),
        (FieldType::Map(xk, xv), FieldType::Map(yk, yv)) => {
            identical(index, xk, yk) && identical(index, xv, yv)
        }
        (FieldType::Interface, FieldType::Interface) => true,
        (FieldType::Opaque(x), FieldType::Opaque(y)) => {
            x.split_whitespace().eq(y.split_whitespace())
        }
        _ => false,
    }
}

/// Decide whether a value of `source` type can be copied into `destination`
pub fn relate(index: &TypeIndex, source: &FieldType, destination: &FieldType) -> TypeRelation {
    if identical(index, source, destination) {
        return TypeRelation::Identical;
    }

    // Distinct structs are mapped field by field through a nested plan
    if index.struct_of(source).is_some() && index.struct_of(destination).is_some() {
        return TypeRelation::Compatible { lossy: false };
    }

    match (source, destination) {
        (_, FieldType::Interface) => TypeRelation::Compatible { lossy: true },
        (FieldType::Pointer(s), FieldType::Pointer(d)) | (FieldType::Slice(s), FieldType::Slice(d)) => {
            relate(index, s, d).converted()
        }
        (FieldType::Array(n, s), FieldType::Array(m, d)) if n == m => {
            relate(index, s, d).converted()
        }
        (FieldType::Map(sk, sv), FieldType::Map(dk, dv)) => relate(index, sk, dk)
            .combine(relate(index, sv, dv))
            .converted(),
        // nil dereferences to the zero value
        (FieldType::Pointer(s), d) => relate(index, s, d).lossy(),
        (s, FieldType::Pointer(d)) => relate(index, s, d).converted(),
        _ => convertible(index, source, destination),
    }
}

/// Scalar conversions, looking through defined types
fn convertible(index: &TypeIndex, source: &FieldType, destination: &FieldType) -> TypeRelation {
    let resolved_source = index.resolve_alias(source);
    let resolved_destination = index.resolve_alias(destination);
    let via_alias =
        !std::ptr::eq(resolved_source, source) || !std::ptr::eq(resolved_destination, destination);

    match (resolved_source, resolved_destination) {
        (FieldType::Primitive(s), FieldType::Primitive(d)) if numeric_convertible(*s, *d) => {
            TypeRelation::Compatible { lossy: true }
        }
        (s, d) if via_alias && identical(index, s, d) => TypeRelation::Compatible { lossy: true },
        _ => TypeRelation::Incompatible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AliasDescriptor, FieldDescriptor, StructDescriptor, TypeDecl};

    fn ty(text: &str) -> FieldType {
        text.parse().unwrap()
    }

    fn index() -> TypeIndex {
        TypeIndex::from_decls([
            TypeDecl::from(
                StructDescriptor::new("", "Address")
                    .with_field(FieldDescriptor::parse("Street", "string").unwrap()),
            ),
            TypeDecl::from(
                StructDescriptor::new("", "AddressDTO")
                    .with_field(FieldDescriptor::parse("Street", "string").unwrap()),
            ),
            TypeDecl::from(AliasDescriptor::new("", "UserID", ty("int64"))),
            TypeDecl::from(AliasDescriptor::new("", "Tags", ty("[]string"))),
        ])
        .unwrap()
    }

    #[test]
    fn test_identical_types() {
        let index = index();
        assert_eq!(relate(&index, &ty("string"), &ty("string")), TypeRelation::Identical);
        assert_eq!(relate(&index, &ty("byte"), &ty("uint8")), TypeRelation::Identical);
        assert_eq!(
            relate(&index, &ty("map[string][]int"), &ty("map[string][]int")),
            TypeRelation::Identical
        );
        assert_eq!(relate(&index, &ty("time.Time"), &ty("time.Time")), TypeRelation::Identical);
    }

    #[test]
    fn test_numeric_conversions_are_lossy() {
        let index = index();
        assert_eq!(
            relate(&index, &ty("int"), &ty("int32")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(
            relate(&index, &ty("[]int"), &ty("[]float64")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(relate(&index, &ty("complex64"), &ty("float64")), TypeRelation::Incompatible);
        assert_eq!(relate(&index, &ty("int"), &ty("string")), TypeRelation::Incompatible);
    }

    #[test]
    fn test_struct_pairs() {
        let index = index();
        assert_eq!(
            relate(&index, &ty("Address"), &ty("AddressDTO")),
            TypeRelation::Compatible { lossy: false }
        );
        assert_eq!(
            relate(&index, &ty("[]*Address"), &ty("[]*AddressDTO")),
            TypeRelation::Compatible { lossy: false }
        );
        assert_eq!(relate(&index, &ty("Address"), &ty("string")), TypeRelation::Incompatible);
        assert_eq!(relate(&index, &ty("Address"), &ty("time.Time")), TypeRelation::Incompatible);
    }

    #[test]
    fn test_pointer_relations() {
        let index = index();
        assert_eq!(
            relate(&index, &ty("string"), &ty("*string")),
            TypeRelation::Compatible { lossy: false }
        );
        assert_eq!(
            relate(&index, &ty("*string"), &ty("string")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(
            relate(&index, &ty("*Address"), &ty("AddressDTO")),
            TypeRelation::Compatible { lossy: true }
        );
    }

    #[test]
    fn test_defined_types() {
        let index = index();
        assert_eq!(
            relate(&index, &ty("UserID"), &ty("int64")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(
            relate(&index, &ty("int32"), &ty("UserID")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(
            relate(&index, &ty("[]string"), &ty("Tags")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(relate(&index, &ty("[]int"), &ty("Tags")), TypeRelation::Incompatible);
    }

    #[test]
    fn test_interface_accepts_anything() {
        let index = index();
        assert_eq!(
            relate(&index, &ty("Address"), &ty("any")),
            TypeRelation::Compatible { lossy: true }
        );
        assert_eq!(relate(&index, &ty("any"), &ty("string")), TypeRelation::Incompatible);
    }
}
