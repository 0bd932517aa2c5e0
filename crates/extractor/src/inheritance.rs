//! Inheritance of update callables
//!
//! An input without its own callable is updated by whatever its nearest
//! module ancestor runs. The input receives an independent copy flagged as
//! inherited; the ancestor is left untouched.
//!
//! The no-op sentinel opts out: an input that declared it inherits nothing,
//! and a module that declared it ends the ancestor walk.

use tracing::debug;

use crate::model::{Callable, ModuleId};
use crate::tree::ModuleTree;

/// Copy ancestor callables into inputs lacking one; returns how many were copied
pub(crate) fn inherit_callables(tree: &mut ModuleTree) -> usize {
    let mut assignments: Vec<(ModuleId, String, Callable)> = Vec::new();

    for id in tree.preorder() {
        let module = tree.module(id);
        let orphans: Vec<&String> = module
            .inputs
            .iter()
            .filter(|(_, input)| input.callable.is_none() && !input.update_suppressed)
            .map(|(name, _)| name)
            .collect();
        if orphans.is_empty() {
            continue;
        }

        let Some(source) = nearest_callable(tree, id) else {
            continue;
        };
        for name in orphans {
            assignments.push((id, name.clone(), source.inherited_copy()));
        }
    }

    let inherited = assignments.len();
    for (id, name, callable) in assignments {
        let module = tree.module_mut(id);
        debug!("{}::{} inherits {}", module.path, name, callable.symbol);
        if let Some(input) = module.inputs.get_mut(&name) {
            input.callable = Some(callable);
        }
    }

    inherited
}

/// Callable of the closest ancestor declaring one, unless a suppressed
/// module comes first
fn nearest_callable(tree: &ModuleTree, id: ModuleId) -> Option<&Callable> {
    for module in tree.ancestors(id) {
        if let Some(callable) = module.callable.as_ref() {
            return Some(callable);
        }
        if module.update_suppressed {
            return None;
        }
    }
    None
}
