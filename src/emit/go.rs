use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

use super::error::{EmitError, Result};
use crate::config::CopyOptions;
use crate::matcher::MatchRule;
use crate::model::{capitalize, FieldType, TypeIndex, TypeRef};
use crate::plan::{calculate_checksum, CopyAction, CopyPlan, PairKey, ValueCopy};

/// Writes copy plans as Go functions, one per struct pair
pub struct GoWriter<'a> {
    index: &'a TypeIndex,
    options: &'a CopyOptions,
    /// Import paths of foreign types the output refers to
    imports: BTreeSet<String>,
    out: String,
}

impl<'a> GoWriter<'a> {
    pub fn new(index: &'a TypeIndex, options: &'a CopyOptions) -> Self {
        Self {
            index,
            options,
            imports: BTreeSet::new(),
            out: String::new(),
        }
    }

    /// Render the root plan and every nested plan, root first. With a
    /// package configured the result is a complete Go file.
    pub fn write(mut self, plan: &CopyPlan) -> Result<String> {
        let plans = plan.plans();
        let names = self.function_names(&plans);

        for (position, nested) in plans.iter().enumerate() {
            if position > 0 {
                self.out.push('\n');
            }
            self.write_function(nested, &names)?;
        }

        let body = std::mem::take(&mut self.out);
        match &self.options.package {
            Some(package) => Ok(self.file_header(package, calculate_checksum(plan)) + &body),
            None => Ok(body),
        }
    }

    fn file_header(&self, package: &str, checksum: u64) -> String {
        let mut header = format!(
            "// Code generated by gostructcopy. DO NOT EDIT.\n// gostructcopy:checksum:{:016x}\n\npackage {}\n\n",
            checksum, package
        );
        if !self.imports.is_empty() {
            header.push_str("import (\n");
            for path in &self.imports {
                header.push_str(&format!("\t\"{}\"\n", path));
            }
            header.push_str(")\n\n");
        }
        header
    }

    /// `CopyAToB`; pairs sharing that name are qualified with package names,
    /// and numbered when that is still ambiguous
    fn function_names(&self, plans: &[&CopyPlan]) -> FxHashMap<PairKey, String> {
        let prefix = &self.options.function_prefix;
        let base = |key: &PairKey| format!("{}{}To{}", prefix, key.source.name, key.destination.name);

        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        for plan in plans {
            *counts.entry(base(&plan.key)).or_default() += 1;
        }

        let mut used = FxHashSet::default();
        let mut names = FxHashMap::default();
        for plan in plans {
            let key = &plan.key;
            let mut name = base(key);
            if counts.get(&name).copied().unwrap_or(0) > 1 {
                name = format!(
                    "{}{}{}To{}{}",
                    prefix,
                    self.package_prefix(&key.source),
                    key.source.name,
                    self.package_prefix(&key.destination),
                    key.destination.name
                );
            }

            let mut candidate = name.clone();
            let mut suffix = 2;
            while !used.insert(candidate.clone()) {
                candidate = format!("{}{}", name, suffix);
                suffix += 1;
            }
            names.insert(key.clone(), candidate);
        }
        names
    }

    fn package_prefix(&self, type_ref: &TypeRef) -> String {
        if self.is_local(&type_ref.package) {
            String::new()
        } else {
            capitalize(type_ref.package_name())
        }
    }

    /// Types of the output package are referred to without qualifier
    fn is_local(&self, package: &str) -> bool {
        self.options.is_output_package(package)
    }

    fn write_function(&mut self, plan: &CopyPlan, names: &FxHashMap<PairKey, String>) -> Result<()> {
        let name = function_name(names, &plan.key)?;
        let source = self.type_name(&plan.key.source);
        let destination = self.type_name(&plan.key.destination);

        self.line(0, format!("// {} copies src into dst.", name));
        self.line(0, format!("func {}(dst *{}, src *{}) {{", name, destination, source));

        for step in &plan.steps {
            let field = step.field();
            match &step.action {
                CopyAction::Skip => {
                    let reason = if step.mapping.rule == MatchRule::Unexported {
                        "unexported outside its package"
                    } else if step.mapping.destination.is_ignored() {
                        "excluded by copy tag"
                    } else {
                        "no matching source field"
                    };
                    self.line(1, format!("// {}: {}", field, reason));
                }
                CopyAction::Copy(copy) => {
                    let source = step.mapping.source.as_ref().ok_or_else(|| {
                        EmitError::MalformedPlan(format!("{}: {} has no source field", plan.key, field))
                    })?;
                    let dst = format!("dst.{}", field);
                    let src = if source.is_whole() {
                        "*src".to_string()
                    } else {
                        format!("src.{}", source.selector())
                    };
                    self.copy_value(copy, &step.mapping.destination.ty, &dst, &src, 0, 1, names)?;
                }
            }
        }

        self.line(0, "}");
        Ok(())
    }

    /// Statements copying `src` into `dst`, where `dst` has type `ty`
    #[allow(clippy::too_many_arguments)]
    fn copy_value(
        &mut self,
        copy: &ValueCopy,
        ty: &FieldType,
        dst: &str,
        src: &str,
        depth: usize,
        indent: usize,
        names: &FxHashMap<PairKey, String>,
    ) -> Result<()> {
        match copy {
            ValueCopy::Assign => self.line(indent, format!("{} = {}", dst, src)),
            ValueCopy::Convert(target) => {
                let target = self.render(target);
                self.line(indent, format!("{} = {}({})", dst, target, src));
            }
            ValueCopy::Struct(link) => {
                let name = function_name(names, link.key())?;
                self.line(indent, format!("{}({}, {})", name, address(dst), address(src)));
            }
            ValueCopy::Pointer(inner) => {
                let pointee = pointee(ty, dst)?;
                let rendered = self.render(pointee);
                self.line(indent, format!("if {} != nil {{", src));
                self.line(indent + 1, format!("{} = new({})", dst, rendered));
                self.copy_value(inner, pointee, &deref(dst), &deref(src), depth, indent + 1, names)?;
                self.line(indent, "}");
            }
            ValueCopy::AddressOf(inner) => {
                let pointee = pointee(ty, dst)?;
                let rendered = self.render(pointee);
                self.line(indent, format!("{} = new({})", dst, rendered));
                self.copy_value(inner, pointee, &deref(dst), src, depth, indent, names)?;
            }
            ValueCopy::Deref(inner) => {
                self.line(indent, format!("if {} != nil {{", src));
                self.copy_value(inner, ty, dst, &deref(src), depth, indent + 1, names)?;
                self.line(indent, "}");
            }
            ValueCopy::Elements(inner) => {
                let (element, is_slice) = match ty {
                    FieldType::Slice(element) => (element.as_ref(), true),
                    FieldType::Array(_, element) => (element.as_ref(), false),
                    other => return Err(shape_mismatch(dst, "slice or array", other)),
                };
                let i = loop_var("i", depth);
                let mut body = indent;
                if is_slice {
                    let rendered = self.render(ty);
                    self.line(indent, format!("if {} != nil {{", src));
                    self.line(indent + 1, format!("{} = make({}, len({}))", dst, rendered, src));
                    body += 1;
                }
                self.line(body, format!("for {} := range {} {{", i, src));
                let element_dst = format!("{}[{}]", operand(dst), i);
                let element_src = format!("{}[{}]", operand(src), i);
                self.copy_value(inner, element, &element_dst, &element_src, depth + 1, body + 1, names)?;
                self.line(body, "}");
                if is_slice {
                    self.line(indent, "}");
                }
            }
            ValueCopy::Entries { key, value } => {
                let FieldType::Map(key_ty, value_ty) = ty else {
                    return Err(shape_mismatch(dst, "map", ty));
                };
                let (k, v) = (loop_var("k", depth), loop_var("v", depth));
                let rendered = self.render(ty);
                self.line(indent, format!("if {} != nil {{", src));
                self.line(indent + 1, format!("{} = make({}, len({}))", dst, rendered, src));
                self.line(indent + 1, format!("for {}, {} := range {} {{", k, v, src));
                let key_expr = self.entry_part(key, key_ty, &k, "dk", depth, indent + 2, names)?;
                let value_expr = self.entry_part(value, value_ty, &v, "dv", depth, indent + 2, names)?;
                self.line(indent + 2, format!("{}[{}] = {}", operand(dst), key_expr, value_expr));
                self.line(indent + 1, "}");
                self.line(indent, "}");
            }
        }
        Ok(())
    }

    /// Copy a map key or value into a temporary unless it can be used as is
    #[allow(clippy::too_many_arguments)]
    fn entry_part(
        &mut self,
        copy: &ValueCopy,
        ty: &FieldType,
        src: &str,
        temporary: &str,
        depth: usize,
        indent: usize,
        names: &FxHashMap<PairKey, String>,
    ) -> Result<String> {
        if copy.is_assign() {
            return Ok(src.to_string());
        }
        let temporary = loop_var(temporary, depth);
        let rendered = self.render(ty);
        self.line(indent, format!("var {} {}", temporary, rendered));
        self.copy_value(copy, ty, &temporary, src, depth + 1, indent, names)?;
        Ok(temporary)
    }

    fn type_name(&mut self, type_ref: &TypeRef) -> String {
        let type_ref = self.index.canonical(type_ref);
        if self.is_local(&type_ref.package) {
            type_ref.name
        } else {
            self.imports.insert(type_ref.package.clone());
            format!("{}.{}", type_ref.package_name(), type_ref.name)
        }
    }

    fn render(&mut self, ty: &FieldType) -> String {
        ty.render_with(&mut |type_ref: &TypeRef| self.type_name(type_ref))
    }

    fn line(&mut self, indent: usize, text: impl AsRef<str>) {
        for _ in 0..indent {
            self.out.push('\t');
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }
}

fn function_name<'n>(names: &'n FxHashMap<PairKey, String>, key: &PairKey) -> Result<&'n str> {
    names
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| EmitError::UnresolvedPlan(key.to_string()))
}

fn pointee<'t>(ty: &'t FieldType, dst: &str) -> Result<&'t FieldType> {
    match ty {
        FieldType::Pointer(inner) => Ok(inner),
        other => Err(shape_mismatch(dst, "pointer", other)),
    }
}

fn shape_mismatch(dst: &str, expected: &str, found: &FieldType) -> EmitError {
    EmitError::MalformedPlan(format!("{} is {}, expected a {}", dst, found, expected))
}

/// `i`, `k`, `v` at the outermost level, then `i1`, `k1`, ...
fn loop_var(base: &str, depth: usize) -> String {
    if depth == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, depth)
    }
}

fn deref(expr: &str) -> String {
    format!("*{}", expr)
}

fn address(expr: &str) -> String {
    match expr.strip_prefix('*') {
        Some(pointer) => pointer.to_string(),
        None => format!("&{}", expr),
    }
}

/// Parenthesize dereferences before indexing
fn operand(expr: &str) -> String {
    if expr.starts_with('*') {
        format!("({})", expr)
    } else {
        expr.to_string()
    }
}
