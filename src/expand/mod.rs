//! Flattens a struct and every type it refers to into one self-contained
//! block of Go definitions, suitable for pasting into another package.
//! Anonymous `struct { ... }` field types become definitions of their own,
//! named after the field.

pub mod error;

pub use error::{ExpandError, Result};

use hashbrown::{HashMap, HashSet};
use std::borrow::Cow;
use std::collections::VecDeque;
use tracing::debug;

use crate::model::tags::{parse_struct_tag, render_tag};
use crate::model::{capitalize, package_name, FieldDescriptor, FieldType, StructDescriptor, TypeDecl, TypeIndex, TypeRef};

/// Render `root` and, breadth-first, every struct and defined type it
/// reaches. Structs come first, defined non-struct types after them.
pub fn expand(index: &TypeIndex, root: &TypeRef) -> Result<String> {
    let decl = index
        .get(root)
        .ok_or_else(|| ExpandError::NotFound(root.to_string()))?;
    if !is_expandable(decl.package(), "") {
        return Err(ExpandError::NotExpandable(root.to_string()));
    }

    let mut expander = Expander::new(index, decl.package());
    expander.reference(&decl.type_ref());
    expander.process();

    debug!(
        root = %root,
        structs = expander.structs.len(),
        aliases = expander.aliases.len(),
        "Expanded definitions"
    );
    Ok(expander.finish())
}

/// Standard library packages (import paths without a dot) are kept as
/// references
fn is_expandable(package: &str, root_package: &str) -> bool {
    package.is_empty() || package.contains('.') || package == root_package
}

struct Expander<'a> {
    index: &'a TypeIndex,
    root_package: String,
    queue: VecDeque<(String, Cow<'a, StructDescriptor>)>,
    structs: Vec<(String, Vec<String>)>,
    aliases: Vec<(String, String)>,
    reserved: HashSet<String>,
    names: HashMap<TypeRef, String>,
}

impl<'a> Expander<'a> {
    fn new(index: &'a TypeIndex, root_package: &str) -> Self {
        Self {
            index,
            root_package: root_package.to_string(),
            queue: VecDeque::new(),
            structs: Vec::new(),
            aliases: Vec::new(),
            reserved: HashSet::new(),
            names: HashMap::new(),
        }
    }

    /// Name a reference renders as, scheduling its definition the first time
    fn reference(&mut self, type_ref: &TypeRef) -> String {
        let index = self.index;
        let Some(decl) = index.get(type_ref) else {
            return type_ref.to_string();
        };
        if !is_expandable(decl.package(), &self.root_package) {
            return type_ref.to_string();
        }

        let key = decl.type_ref();
        if let Some(name) = self.names.get(&key) {
            return name.clone();
        }
        let name = self.reserve(decl.name(), decl.package());
        self.names.insert(key.clone(), name.clone());

        match (index.get_struct(&key), decl) {
            (Some(descriptor), _) => self.queue.push_back((name.clone(), Cow::Borrowed(descriptor))),
            (None, TypeDecl::Alias(alias)) => {
                let underlying = self.render_in(&alias.underlying, &name, decl.package(), None);
                self.aliases.push((name.clone(), underlying));
            }
            (None, TypeDecl::Struct(_)) => {}
        }
        name
    }

    /// The type's own name when free, then the package-qualified name, then
    /// numbered variants of the last candidate
    fn reserve(&mut self, name: &str, package: &str) -> String {
        let mut candidates = vec![name.to_string()];
        if !package.is_empty() {
            candidates.push(format!("{}{}", capitalize(package_name(package)), name));
        }
        self.reserve_first(candidates)
    }

    fn reserve_first(&mut self, candidates: Vec<String>) -> String {
        for candidate in &candidates {
            if self.reserved.insert(candidate.clone()) {
                return candidate.clone();
            }
        }

        let base = candidates.last().cloned().unwrap_or_default();
        let mut counter = 2;
        loop {
            let candidate = format!("{}{}", base, counter);
            if self.reserved.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn render(&mut self, ty: &FieldType) -> String {
        ty.render_with(&mut |type_ref: &TypeRef| self.reference(type_ref))
    }

    /// Like `render`, but anonymous structs found in a type of `owner` are
    /// replaced by a definition of their own
    fn render_in(&mut self, ty: &FieldType, owner: &str, package: &str, field: Option<&str>) -> String {
        match ty {
            FieldType::Opaque(text) => match anonymous_fields(text, package) {
                Some(fields) => self.anonymous(owner, package, field, fields),
                None => text.clone(),
            },
            FieldType::Pointer(inner) => format!("*{}", self.render_in(inner, owner, package, field)),
            FieldType::Slice(inner) => format!("[]{}", self.render_in(inner, owner, package, field)),
            FieldType::Array(len, inner) => {
                format!("[{}]{}", len, self.render_in(inner, owner, package, field))
            }
            FieldType::Map(key, value) => {
                let key = self.render_in(key, owner, package, field);
                format!("map[{}]{}", key, self.render_in(value, owner, package, field))
            }
            other => self.render(other),
        }
    }

    /// `Meta` for a field `Meta struct { ... }`, `<Owner>Anonymous` without
    /// a field; numbered when taken
    fn anonymous(
        &mut self,
        owner: &str,
        package: &str,
        field: Option<&str>,
        fields: Vec<FieldDescriptor>,
    ) -> String {
        let base = match field {
            Some(field) => capitalize(field),
            None => format!("{}Anonymous", owner),
        };
        let name = self.reserve_first(vec![base]);
        let mut descriptor = StructDescriptor::new(package, name.clone());
        descriptor.fields = fields;
        self.queue.push_back((name.clone(), Cow::Owned(descriptor)));
        name
    }

    fn process(&mut self) {
        while let Some((name, descriptor)) = self.queue.pop_front() {
            let lines = descriptor
                .fields
                .iter()
                .map(|field| self.field_line(&name, &descriptor.package, field))
                .collect();
            self.structs.push((name, lines));
        }
    }

    fn field_line(&mut self, owner: &str, package: &str, field: &FieldDescriptor) -> String {
        let name = (!field.embedded).then_some(field.name.as_str());
        let ty = self.render_in(&field.ty, owner, package, name);
        let mut line = if field.embedded {
            ty
        } else {
            format!("{} {}", field.name, ty)
        };
        if let Some(json) = field.tag("json") {
            line.push(' ');
            line.push_str(&render_tag("json", json));
        }
        line
    }

    fn finish(&self) -> String {
        let mut out = String::new();
        for (position, (name, lines)) in self.structs.iter().enumerate() {
            if position > 0 {
                out.push('\n');
            }
            out.push_str(&format!("type {} struct {{\n", name));
            for line in lines {
                out.push('\t');
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("}\n");
        }

        if !self.aliases.is_empty() && !self.structs.is_empty() {
            out.push('\n');
        }
        for (name, underlying) in &self.aliases {
            out.push_str(&format!("type {} {}\n", name, underlying));
        }
        out
    }
}

/// Fields of an anonymous `struct { ... }` type declared in `package`. None
/// when the text is not a struct type this parser understands.
fn anonymous_fields(text: &str, package: &str) -> Option<Vec<FieldDescriptor>> {
    let body = text
        .trim()
        .strip_prefix("struct")?
        .trim_start()
        .strip_prefix('{')?
        .trim_end()
        .strip_suffix('}')?;

    let mut fields = Vec::new();
    for entry in split_declarations(body) {
        let (declaration, tag) = split_tag(entry);
        let (names, ty) = split_names(declaration)?;
        let mut ty: FieldType = ty.parse().ok()?;
        ty.qualify(package);

        let declared: Vec<FieldDescriptor> = if names.is_empty() {
            vec![FieldDescriptor::embedded(ty)]
        } else {
            names
                .into_iter()
                .map(|name| FieldDescriptor::new(name, ty.clone()))
                .collect()
        };
        for mut field in declared {
            if let Some(tag) = tag {
                field.tags.extend(parse_struct_tag(tag));
            }
            fields.push(field);
        }
    }
    Some(fields)
}

/// Field declarations separated by `;` or newlines outside brackets and
/// string literals
fn split_declarations(body: &str) -> Vec<&str> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && open == '"' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '`' | '"' => quote = Some(c),
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth = depth.saturating_sub(1),
            ';' | '\n' if depth == 0 => {
                declarations.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    declarations.push(&body[start..]);

    declarations
        .into_iter()
        .map(str::trim)
        .filter(|declaration| !declaration.is_empty())
        .collect()
}

/// Split off a trailing raw string tag
fn split_tag(declaration: &str) -> (&str, Option<&str>) {
    if let Some(inner) = declaration.strip_suffix('`') {
        if let Some(start) = inner.rfind('`') {
            return (declaration[..start].trim_end(), Some(&declaration[start..]));
        }
    }
    (declaration, None)
}

/// `A, B int` yields the names and the type; an embedded field yields no
/// names and the whole declaration
fn split_names(declaration: &str) -> Option<(Vec<&str>, &str)> {
    let mut names = Vec::new();
    let mut rest = declaration;
    loop {
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            // `*Base`
            return names.is_empty().then_some((names, declaration));
        }

        let (name, after) = rest.split_at(len);
        let trimmed = after.trim_start();
        if let Some(next) = trimmed.strip_prefix(',') {
            names.push(name);
            rest = next.trim_start();
            continue;
        }
        // `Base` or `pkg.Base`
        if trimmed.is_empty() || after.starts_with('.') {
            return names.is_empty().then_some((names, declaration));
        }
        names.push(name);
        return Some((names, trimmed));
    }
}
