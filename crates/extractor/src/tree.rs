//! Module tree arena and builder

use indexmap::IndexMap;

use crate::classify::SymbolRole;
use crate::model::{
    Callable, DataEntity, Input, Module, ModuleId, ModulePath, Procedure, ProcedureArgument,
};

/// Arena holding every module of one firmware
///
/// Children are kept in first-seen order, which is the order the document
/// lists them in.
#[derive(Debug, Clone, Default)]
pub struct ModuleTree {
    nodes: Vec<Module>,
    roots: IndexMap<String, ModuleId>,
}

/// Mutable access to the node a classified symbol describes
pub enum TargetMut<'a> {
    Module(&'a mut Module),
    Input(&'a mut Input),
    Procedure(&'a mut Procedure),
    Argument(&'a mut ProcedureArgument),
}

impl<'a> TargetMut<'a> {
    pub fn set_description(self, description: String) {
        match self {
            TargetMut::Module(module) => module.description = description,
            TargetMut::Input(input) => input.description = description,
            TargetMut::Procedure(procedure) => procedure.description = description,
            TargetMut::Argument(argument) => argument.description = description,
        }
    }

    /// Attach a callable; arguments cannot hold one
    pub fn set_callable(self, callable: Callable) -> bool {
        match self {
            TargetMut::Module(module) => module.callable = Some(callable),
            TargetMut::Input(input) => input.callable = Some(callable),
            TargetMut::Procedure(procedure) => procedure.callable = Some(callable),
            TargetMut::Argument(_) => return false,
        }
        true
    }

    /// Storage description of inputs and arguments
    pub fn data_mut(self) -> Option<&'a mut DataEntity> {
        match self {
            TargetMut::Input(input) => Some(&mut input.data),
            TargetMut::Argument(argument) => Some(&mut argument.data),
            TargetMut::Module(_) | TargetMut::Procedure(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TargetMut::Module(_) => "module",
            TargetMut::Input(_) => "input",
            TargetMut::Procedure(_) => "procedure",
            TargetMut::Argument(_) => "argument",
        }
    }
}

impl ModuleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of modules at any depth
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.nodes[id.0]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.nodes[id.0]
    }

    /// Top-level modules in first-seen order
    pub fn roots(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.roots.values().copied()
    }

    /// Walk from the root, creating a node for every unseen segment
    pub fn get_or_create(&mut self, path: &ModulePath) -> ModuleId {
        let mut current: Option<ModuleId> = None;
        let mut joined = String::new();

        for segment in path.segments() {
            if !joined.is_empty() {
                joined.push_str("::");
            }
            joined.push_str(segment);

            let existing = match current {
                None => self.roots.get(segment).copied(),
                Some(parent) => self.nodes[parent.0].modules.get(segment).copied(),
            };

            let id = match existing {
                Some(id) => id,
                None => {
                    let id = ModuleId(self.nodes.len());
                    self.nodes.push(Module::new(segment, joined.clone(), current));
                    match current {
                        None => self.roots.insert(segment.clone(), id),
                        Some(parent) => self.nodes[parent.0].modules.insert(segment.clone(), id),
                    };
                    id
                }
            };
            current = Some(id);
        }

        // ModulePath guarantees at least one segment
        current.unwrap_or(ModuleId(0))
    }

    /// Look a module up without creating anything
    pub fn find(&self, path: &ModulePath) -> Option<ModuleId> {
        let mut segments = path.segments().iter();
        let mut current = *self.roots.get(segments.next()?)?;
        for segment in segments {
            current = *self.nodes[current.0].modules.get(segment)?;
        }
        Some(current)
    }

    /// The module itself, then each enclosing module up to the root
    pub fn ancestors(&self, id: ModuleId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// All modules in document order: a module precedes its children
    pub fn preorder(&self) -> Vec<ModuleId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<ModuleId> = self.roots.values().rev().copied().collect();

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].modules.values().rev().copied());
        }

        order
    }

    pub fn has_procedures(&self) -> bool {
        self.nodes.iter().any(|m| !m.procedures.is_empty())
    }

    /// Node described by a classified symbol, created if it does not exist yet
    pub fn target_mut(&mut self, role: &SymbolRole) -> Option<TargetMut<'_>> {
        match role {
            SymbolRole::ModuleMarker(_) | SymbolRole::Irrelevant => None,
            SymbolRole::Module { module, .. } => {
                let id = self.get_or_create(module);
                Some(TargetMut::Module(self.module_mut(id)))
            }
            SymbolRole::Input { module, input, .. } => {
                let id = self.get_or_create(module);
                Some(TargetMut::Input(self.module_mut(id).input_mut(input)))
            }
            SymbolRole::Procedure {
                module, procedure, ..
            } => {
                let id = self.get_or_create(module);
                Some(TargetMut::Procedure(
                    self.module_mut(id).procedure_mut(procedure),
                ))
            }
            SymbolRole::Argument {
                module,
                procedure,
                argument,
                ..
            } => {
                let id = self.get_or_create(module);
                Some(TargetMut::Argument(
                    self.module_mut(id)
                        .procedure_mut(procedure)
                        .argument_mut(argument),
                ))
            }
        }
    }
}

/// Iterator over a module and its ancestors
pub struct Ancestors<'a> {
    tree: &'a ModuleTree,
    next: Option<ModuleId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Module;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let module = self.tree.module(id);
        self.next = module.parent;
        Some(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> ModulePath {
        ModulePath::parse(text).unwrap()
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut tree = ModuleTree::new();
        let first = tree.get_or_create(&path("A::B"));
        let second = tree.get_or_create(&path("A::B"));

        assert_eq!(first, second);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.module(first).path, "A::B");
        assert_eq!(tree.module(first).name, "B");
    }

    #[test]
    fn test_parent_links() {
        let mut tree = ModuleTree::new();
        let leaf = tree.get_or_create(&path("A::B::C"));
        let names: Vec<&str> = tree.ancestors(leaf).map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);

        let root = tree.find(&path("A")).unwrap();
        assert!(tree.module(root).parent.is_none());
        assert!(tree.find(&path("A::X")).is_none());
    }

    #[test]
    fn test_preorder_follows_first_seen_order() {
        let mut tree = ModuleTree::new();
        tree.get_or_create(&path("Zeta"));
        tree.get_or_create(&path("Alpha::Inner"));
        tree.get_or_create(&path("Zeta::Child"));
        tree.get_or_create(&path("Alpha"));

        let order: Vec<&str> = tree
            .preorder()
            .into_iter()
            .map(|id| tree.module(id).path.as_str())
            .collect();
        assert_eq!(order, vec!["Zeta", "Zeta::Child", "Alpha", "Alpha::Inner"]);

        let roots: Vec<&str> = tree.roots().map(|id| tree.module(id).name.as_str()).collect();
        assert_eq!(roots, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_same_name_under_different_parents() {
        let mut tree = ModuleTree::new();
        let a = tree.get_or_create(&path("A::Settings"));
        let b = tree.get_or_create(&path("B::Settings"));
        assert_ne!(a, b);
        assert_eq!(tree.len(), 4);
    }
}
