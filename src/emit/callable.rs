use hashbrown::HashMap;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use tracing::trace;

use super::error::{EmitError, ExecError};
use crate::model::{FieldType, Primitive, TypeIndex, TypeRef};
use crate::plan::{CopyAction, CopyPlan, PairKey, ValueCopy};

/// Struct zero values nest at most this deep
const MAX_ZERO_DEPTH: usize = 64;

/// Upper bound on the array elements one zero value may hold
const MAX_ZERO_ELEMENTS: usize = 1 << 20;

/// A copy plan bound to its type index, applied to dynamic values.
///
/// Struct values are JSON objects keyed by Go field name, pointers are the
/// pointee or `null`, slices and arrays are JSON arrays and maps are objects.
/// The operation is immutable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct CopyOperation {
    root: PairKey,
    plans: Arc<HashMap<PairKey, CopyPlan>>,
    index: Arc<TypeIndex>,
}

impl CopyOperation {
    pub fn new(plan: &CopyPlan, index: Arc<TypeIndex>) -> Result<Self, EmitError> {
        let plans: HashMap<PairKey, CopyPlan> = plan
            .plans()
            .into_iter()
            .map(|nested| (nested.key.clone(), nested.clone()))
            .collect();

        for nested in plans.values() {
            for step in &nested.steps {
                let CopyAction::Copy(copy) = &step.action else {
                    continue;
                };
                if let Some(link) = copy.links().into_iter().find(|link| !plans.contains_key(link.key())) {
                    return Err(EmitError::UnresolvedPlan(link.key().to_string()));
                }
            }
        }

        Ok(Self {
            root: plan.key.clone(),
            plans: Arc::new(plans),
            index,
        })
    }

    pub fn source(&self) -> &TypeRef {
        &self.root.source
    }

    pub fn destination(&self) -> &TypeRef {
        &self.root.destination
    }

    /// Copy a source struct value into a new destination struct value
    pub fn apply(&self, source: &Value) -> Result<Value, ExecError> {
        self.copy_struct(&self.root, source, "$")
    }

    fn copy_struct(&self, key: &PairKey, value: &Value, path: &str) -> Result<Value, ExecError> {
        let plan = self
            .plans
            .get(key)
            .ok_or_else(|| ExecError::UnresolvedPlan(key.to_string()))?;
        let Value::Object(object) = value else {
            return Err(mismatch(path, "object", value));
        };

        let mut copied = Map::new();
        for step in &plan.steps {
            let ty = &step.mapping.destination.ty;
            let field_path = format!("{}.{}", path, step.field());
            let field_value = match (&step.action, &step.mapping.source) {
                (CopyAction::Copy(copy), Some(source)) if source.is_whole() => {
                    self.copy_value(copy, ty, value, path)?
                }
                (CopyAction::Copy(copy), Some(source)) => match lookup(object, &source.path) {
                    Some(value) => {
                        let source_path = format!("{}.{}", path, source.selector());
                        self.copy_value(copy, ty, value, &source_path)?
                    }
                    None => {
                        trace!(field = %step.field(), path, "Source value missing");
                        self.zero_value_at(ty, &field_path)?
                    }
                },
                _ => self.zero_value_at(ty, &field_path)?,
            };
            copied.insert(step.field().to_string(), field_value);
        }
        Ok(Value::Object(copied))
    }

    /// `ty` is the destination type of the value being produced
    fn copy_value(&self, copy: &ValueCopy, ty: &FieldType, value: &Value, path: &str) -> Result<Value, ExecError> {
        match copy {
            ValueCopy::Assign => Ok(value.clone()),
            ValueCopy::Convert(target) => self.convert(value, target, path),
            ValueCopy::Struct(link) => self.copy_struct(link.key(), value, path),
            ValueCopy::Pointer(inner) => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                self.copy_value(inner, pointee(ty), value, path)
            }
            ValueCopy::AddressOf(inner) => self.copy_value(inner, pointee(ty), value, path),
            ValueCopy::Deref(inner) => {
                if value.is_null() {
                    return self.zero_value_at(ty, path);
                }
                self.copy_value(inner, ty, value, path)
            }
            ValueCopy::Elements(inner) => match value {
                Value::Null => self.zero_value_at(ty, path),
                Value::Array(items) => {
                    let element = element(ty);
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.copy_value(inner, element, item, &format!("{}[{}]", path, i)))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                }
                other => Err(mismatch(path, "array", other)),
            },
            ValueCopy::Entries { key, value: entry } => match value {
                Value::Null => Ok(Value::Null),
                Value::Object(map) => {
                    let (key_ty, value_ty) = match ty {
                        FieldType::Map(key_ty, value_ty) => (key_ty.as_ref(), value_ty.as_ref()),
                        other => (other, other),
                    };
                    let mut copied = Map::new();
                    for (name, item) in map {
                        let item_path = format!("{}[{:?}]", path, name);
                        let copied_key = self.copy_value(key, key_ty, &Value::String(name.clone()), &item_path)?;
                        let copied_key = map_key(&copied_key, &item_path)?;
                        copied.insert(copied_key, self.copy_value(entry, value_ty, item, &item_path)?);
                    }
                    Ok(Value::Object(copied))
                }
                other => Err(mismatch(path, "object", other)),
            },
        }
    }

    /// Go conversion to `target`. Defined types keep their representation;
    /// numbers are cast like Go does.
    fn convert(&self, value: &Value, target: &FieldType, path: &str) -> Result<Value, ExecError> {
        match self.index.resolve_alias(target) {
            FieldType::Primitive(primitive) if primitive.is_numeric() && !primitive.is_complex() => {
                cast_number(value, *primitive, path)
            }
            _ => Ok(value.clone()),
        }
    }

    /// Go zero value of a destination type
    pub fn zero_value(&self, ty: &FieldType) -> Result<Value, ExecError> {
        self.zero_value_at(ty, "$")
    }

    fn zero_value_at(&self, ty: &FieldType, path: &str) -> Result<Value, ExecError> {
        let mut zero = ZeroValue {
            index: &self.index,
            path,
            elements: 1,
        };
        zero.build(ty, 0)
    }
}

/// Builds zero values while keeping the number of array elements bounded
struct ZeroValue<'o> {
    index: &'o TypeIndex,
    path: &'o str,
    /// Copies of the value under construction that arrays have asked for
    elements: usize,
}

impl ZeroValue<'_> {
    fn build(&mut self, ty: &FieldType, depth: usize) -> Result<Value, ExecError> {
        if depth > MAX_ZERO_DEPTH {
            return Ok(Value::Null);
        }
        let value = match self.index.resolve_alias(ty) {
            FieldType::Primitive(Primitive::Bool) => Value::Bool(false),
            FieldType::Primitive(Primitive::String) => Value::String(String::new()),
            FieldType::Primitive(primitive) if primitive.is_complex() => Value::Null,
            FieldType::Primitive(primitive) if primitive.is_float() => Number::from_f64(0.0)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldType::Primitive(_) => Value::from(0),
            FieldType::Array(len, inner) => {
                let outer = self.elements;
                self.elements = outer
                    .checked_mul(*len)
                    .filter(|total| *total <= MAX_ZERO_ELEMENTS)
                    .ok_or_else(|| ExecError::ValueTooLarge {
                        path: self.path.to_string(),
                        elements: *len,
                    })?;
                let element = self.build(inner, depth + 1)?;
                self.elements = outer;
                Value::Array(vec![element; *len])
            }
            FieldType::Named(type_ref) => match self.index.get_struct(type_ref) {
                Some(decl) => {
                    let mut object = Map::new();
                    for field in &decl.fields {
                        object.insert(field.name.clone(), self.build(&field.ty, depth + 1)?);
                    }
                    Value::Object(object)
                }
                None => Value::Null,
            },
            _ => Value::Null,
        };
        Ok(value)
    }
}

fn lookup<'v>(object: &'v Map<String, Value>, path: &[String]) -> Option<&'v Value> {
    let (last, parents) = path.split_last()?;
    let mut current = object;
    for name in parents {
        match current.get(name)? {
            Value::Object(inner) => current = inner,
            _ => return None,
        }
    }
    current.get(last)
}

fn pointee(ty: &FieldType) -> &FieldType {
    match ty {
        FieldType::Pointer(inner) => inner,
        other => other,
    }
}

fn element(ty: &FieldType) -> &FieldType {
    match ty {
        FieldType::Slice(inner) | FieldType::Array(_, inner) => inner,
        other => other,
    }
}

fn cast_number(value: &Value, primitive: Primitive, path: &str) -> Result<Value, ExecError> {
    let number = match value {
        Value::Number(number) => number.clone(),
        // map keys arrive as strings
        Value::String(text) => text
            .trim()
            .parse::<Number>()
            .map_err(|_| mismatch(path, "number", value))?,
        other => return Err(mismatch(path, "number", other)),
    };

    if primitive.is_float() {
        let float = number.as_f64().ok_or_else(|| mismatch(path, "number", value))?;
        let float = if primitive == Primitive::Float32 {
            float as f32 as f64
        } else {
            float
        };
        return Number::from_f64(float)
            .map(Value::Number)
            .ok_or_else(|| mismatch(path, "finite number", value));
    }

    let wide = if let Some(signed) = number.as_i64() {
        signed as i128
    } else if let Some(unsigned) = number.as_u64() {
        unsigned as i128
    } else {
        number.as_f64().map(f64::trunc).unwrap_or(0.0) as i128
    };
    let wrapped = wrap_integer(wide, primitive.bits(), primitive.is_signed());
    Ok(if primitive.is_signed() {
        Value::from(wrapped as i64)
    } else {
        Value::from(wrapped as u64)
    })
}

/// Two's complement truncation to `bits`
fn wrap_integer(value: i128, bits: u32, signed: bool) -> i128 {
    let modulus = 1i128 << bits;
    let wrapped = value.rem_euclid(modulus);
    if signed && wrapped >= modulus / 2 {
        wrapped - modulus
    } else {
        wrapped
    }
}

fn map_key(key: &Value, path: &str) -> Result<String, ExecError> {
    match key {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(mismatch(path, "map key", other)),
    }
}

fn mismatch(path: &str, expected: &str, found: &Value) -> ExecError {
    ExecError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: kind(found).to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
