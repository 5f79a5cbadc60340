//! [`GlobalRegistry`]: the arena of classes plus the flat maps of functions
//! and constants, keyed by lowercased qualified name. Classes are stored by
//! stable index (`ClassId`) rather than owned so that parent/interface/trait
//! references never form an ownership cycle.

use super::{ClassInfo, ConstInfo, FunctionSig};
use crate::ast::Expr;
use crate::name::fold;
use crate::types::ClassQuery;
use camino::Utf8PathBuf;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone)]
pub struct GlobalConstant {
    pub qualified_name: String,
    pub value: Option<Expr>,
    pub ty: Option<crate::types::Type>,
}

#[derive(Debug, Default)]
pub struct GlobalRegistry {
    classes: Vec<ClassInfo>,
    class_ids: FxHashMap<String, ClassId>,
    functions: FxHashMap<String, FunctionSig>,
    constants: FxHashMap<String, GlobalConstant>,
    loaded_files: FxHashSet<Utf8PathBuf>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- files ----

    pub fn mark_loaded(&mut self, file: Utf8PathBuf) -> bool {
        self.loaded_files.insert(file)
    }

    pub fn is_loaded(&self, file: &Utf8PathBuf) -> bool {
        self.loaded_files.contains(file)
    }

    pub fn loaded_files(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.loaded_files.iter()
    }

    // ---- classes ----

    /// Inserts a new class entry, returning its id. Callers are responsible
    /// for checking `class_exists` first if redeclaration should be
    /// diagnosed rather than silently shadowed.
    pub fn insert_class(&mut self, info: ClassInfo) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.class_ids.insert(info.folded_name(), id);
        self.classes.push(info);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0 as usize]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassInfo {
        &mut self.classes[id.0 as usize]
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.class_ids.get(&fold(name)).copied()
    }

    pub fn get_class(&self, name: &str) -> Option<&ClassInfo> {
        self.class_id(name).map(|id| self.class(id))
    }

    pub fn class_exists(&self, name: &str) -> bool {
        self.get_class(name).is_some()
    }

    pub fn interface_exists(&self, name: &str) -> bool {
        matches!(self.get_class(name), Some(c) if c.kind == super::ClassKind::Interface)
    }

    pub fn trait_exists(&self, name: &str) -> bool {
        matches!(self.get_class(name), Some(c) if c.kind == super::ClassKind::Trait)
    }

    pub fn all_class_ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len() as u32).map(ClassId)
    }

    // ---- functions ----

    pub fn insert_function(&mut self, sig: FunctionSig) {
        self.functions.insert(fold(&sig.qualified_name), sig);
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.get(&fold(name))
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.get_function(name).is_some()
    }

    // ---- constants ----

    pub fn insert_constant(&mut self, constant: GlobalConstant) {
        self.constants.insert(fold(&constant.qualified_name), constant);
    }

    pub fn get_constant(&self, name: &str) -> Option<&GlobalConstant> {
        self.constants.get(&fold(name))
    }

    pub fn constant_exists(&self, name: &str) -> bool {
        self.get_constant(name).is_some()
    }

    // ---- ancestry ----

    /// Ancestor chain of `id`, not including `id` itself.
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut out = Vec::new();
        let mut cur = self.class(id).parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.class(p).parent;
        }
        out
    }

    pub fn is_ancestor_or_self(&self, id: ClassId, target_folded: &str) -> bool {
        if self.class(id).folded_name() == target_folded {
            return true;
        }
        self.ancestors(id)
            .iter()
            .any(|a| self.class(*a).folded_name() == target_folded)
    }
}

impl ClassQuery for GlobalRegistry {
    fn is_class_like(&self, name: &str) -> bool {
        self.class_exists(name) || super::host::is_host_class(name)
    }

    fn is_instance_of(&self, name: &str, target: &str) -> bool {
        let Some(id) = self.class_id(name) else {
            return fold(name) == fold(target);
        };
        let target_folded = fold(target);
        if self.is_ancestor_or_self(id, &target_folded) {
            return true;
        }
        self.class(id)
            .interface_names_closure
            .iter()
            .any(|n| fold(n) == target_folded)
    }

    fn implements_stringable(&self, name: &str) -> bool {
        self.is_instance_of(name, "Stringable")
    }
}
