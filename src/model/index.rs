use hashbrown::{HashMap, HashSet};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::error::{ModelError, Result};
use super::types::{package_name, FieldType, TypeRef};
use super::{AliasDescriptor, StructDescriptor, TypeDecl};

/// Alias chains longer than this are treated as unresolvable
const MAX_ALIAS_DEPTH: usize = 32;

/// Immutable snapshot of every type declaration the indexer supplied
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    decls: Vec<TypeDecl>,
    by_ref: HashMap<TypeRef, usize>,
}

/// Accepted layouts of a descriptor file
#[derive(Deserialize)]
#[serde(untagged)]
enum IndexDocument {
    Types { types: Vec<TypeDecl> },
    List(Vec<TypeDecl>),
    Single(TypeDecl),
}

impl IndexDocument {
    fn into_decls(self) -> Vec<TypeDecl> {
        match self {
            IndexDocument::Types { types } => types,
            IndexDocument::List(types) => types,
            IndexDocument::Single(decl) => vec![decl],
        }
    }
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_decls<I, D>(decls: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<TypeDecl>,
    {
        let mut index = Self::new();
        for decl in decls {
            index.insert(decl)?;
        }
        Ok(index)
    }

    /// Add a declaration; unqualified references inside it are resolved
    /// against its own package
    pub fn insert(&mut self, decl: impl Into<TypeDecl>) -> Result<()> {
        let mut decl = decl.into();
        decl.qualify();

        let type_ref = decl.type_ref();
        if self.by_ref.contains_key(&type_ref) {
            return Err(ModelError::DuplicateDeclaration(type_ref.to_string()));
        }

        self.by_ref.insert(type_ref, self.decls.len());
        self.decls.push(decl);
        Ok(())
    }

    /// Look up a declaration by exact reference, then by package name, and
    /// finally, for unqualified references, by a unique type name
    pub fn get(&self, type_ref: &TypeRef) -> Option<&TypeDecl> {
        if let Some(&position) = self.by_ref.get(type_ref) {
            return Some(&self.decls[position]);
        }

        // `dto.Config` is ambiguous when several packages are named `dto`
        let wanted = type_ref.package_name();
        let mut by_package = self.decls.iter().filter(|decl| {
            decl.name() == type_ref.name && package_name(decl.package()) == wanted
        });
        match (by_package.next(), by_package.next()) {
            (Some(decl), None) => return Some(decl),
            (Some(_), Some(_)) => return None,
            _ => {}
        }

        if type_ref.is_local() {
            let mut by_name = self
                .decls
                .iter()
                .filter(|decl| decl.name() == type_ref.name);
            if let (Some(decl), None) = (by_name.next(), by_name.next()) {
                return Some(decl);
            }
        }

        None
    }

    /// Struct declaration behind a reference, following defined types whose
    /// underlying type is another struct (`type Admin User`)
    pub fn get_struct(&self, type_ref: &TypeRef) -> Option<&StructDescriptor> {
        let mut current = self.get(type_ref)?;
        for _ in 0..MAX_ALIAS_DEPTH {
            match current {
                TypeDecl::Struct(decl) => return Some(decl),
                TypeDecl::Alias(AliasDescriptor {
                    underlying: FieldType::Named(next),
                    ..
                }) => current = self.get(next)?,
                TypeDecl::Alias(_) => return None,
            }
        }
        None
    }

    pub fn get_alias(&self, type_ref: &TypeRef) -> Option<&AliasDescriptor> {
        self.get(type_ref).and_then(TypeDecl::as_alias)
    }

    /// Struct descriptor of a field type, when it names a known struct
    pub fn struct_of(&self, ty: &FieldType) -> Option<&StructDescriptor> {
        match ty {
            FieldType::Named(type_ref) => self.get_struct(type_ref),
            _ => None,
        }
    }

    /// Follow non-struct aliases down to the first type that is not one
    pub fn resolve_alias<'a>(&'a self, ty: &'a FieldType) -> &'a FieldType {
        let mut current = ty;
        for _ in 0..MAX_ALIAS_DEPTH {
            match current {
                FieldType::Named(type_ref) if self.get_struct(type_ref).is_none() => {
                    match self.get_alias(type_ref) {
                        Some(alias) => current = &alias.underlying,
                        None => return current,
                    }
                }
                _ => return current,
            }
        }
        current
    }

    /// Whether two references denote the same declared type
    pub fn same_type(&self, a: &TypeRef, b: &TypeRef) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => std::ptr::eq(x, y),
            (None, None) => a.name == b.name && a.package_name() == b.package_name(),
            _ => false,
        }
    }

    /// Canonical reference of the declaration behind `type_ref`, or the
    /// reference itself for external types
    pub fn canonical(&self, type_ref: &TypeRef) -> TypeRef {
        self.get(type_ref)
            .map(TypeDecl::type_ref)
            .unwrap_or_else(|| type_ref.clone())
    }

    /// Find a cycle of direct (non-indirected) struct containment reachable
    /// from `root`. Pointers, slices and maps break cycles; arrays and
    /// defined types do not.
    pub fn find_direct_cycle(&self, root: &TypeRef) -> Option<Vec<String>> {
        let mut stack = Vec::new();
        let mut done = HashSet::new();
        self.visit_direct(root, &mut stack, &mut done)
    }

    fn visit_direct(
        &self,
        type_ref: &TypeRef,
        stack: &mut Vec<TypeRef>,
        done: &mut HashSet<TypeRef>,
    ) -> Option<Vec<String>> {
        let decl = self.get(type_ref)?;
        let key = decl.type_ref();

        if let Some(position) = stack.iter().position(|entry| *entry == key) {
            let mut path: Vec<String> = stack[position..].iter().map(ToString::to_string).collect();
            path.push(key.to_string());
            return Some(path);
        }
        if done.contains(&key) {
            return None;
        }

        let mut edges = Vec::new();
        match decl {
            TypeDecl::Struct(decl) => {
                for field in &decl.fields {
                    direct_refs(&field.ty, &mut edges);
                }
            }
            TypeDecl::Alias(decl) => direct_refs(&decl.underlying, &mut edges),
        }

        stack.push(key.clone());
        for edge in &edges {
            if let Some(path) = self.visit_direct(edge, stack, done) {
                return Some(path);
            }
        }
        stack.pop();
        done.insert(key);
        None
    }

    pub fn decls(&self) -> impl Iterator<Item = &TypeDecl> + '_ {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Parse one descriptor document: `{"types": [...]}`, a bare list, or a
    /// single declaration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut index = Self::new();
        index.extend_from_json(json, "<memory>")?;
        Ok(index)
    }

    /// Load descriptors from a JSON file, or from every `*.json` file below a
    /// directory (visited in file name order)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut index = Self::new();

        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
                if entry.file_type().is_file() && is_json {
                    index.extend_from_file(entry.path())?;
                }
            }
        } else {
            index.extend_from_file(path)?;
        }

        info!(types = index.len(), path = %path.display(), "Loaded type index");
        Ok(index)
    }

    fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|source| ModelError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Reading descriptor file");
        self.extend_from_json(&json, &path.display().to_string())
    }

    fn extend_from_json(&mut self, json: &str, origin: &str) -> Result<()> {
        let document: IndexDocument =
            serde_json::from_str(json).map_err(|source| ModelError::ParseFailed {
                path: origin.to_string(),
                source,
            })?;
        for decl in document.into_decls() {
            self.insert(decl)?;
        }
        Ok(())
    }
}

/// Named types a value of `ty` contains inline
fn direct_refs(ty: &FieldType, out: &mut Vec<TypeRef>) {
    match ty {
        FieldType::Named(type_ref) => out.push(type_ref.clone()),
        FieldType::Array(_, inner) => direct_refs(inner, out),
        _ => {}
    }
}
