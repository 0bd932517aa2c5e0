//! Procedure argument layout
//!
//! Every procedure passes its arguments through one shared overlay, so all
//! argument addresses are offsets from the same base symbol.

use fwmeta_core::config::TargetConfig;
use fwmeta_core::{Error, ResolvedAddress, Result};
use tracing::{debug, info};

use crate::address::SymbolAddressTable;
use crate::tree::ModuleTree;

/// Lay out every procedure argument; returns the number placed
///
/// The overlay base is only required when the tree declares procedures.
pub(crate) fn resolve_arguments(
    tree: &mut ModuleTree,
    table: &SymbolAddressTable,
    target: &TargetConfig,
) -> Result<usize> {
    if !tree.has_procedures() {
        debug!("No procedures declared, skipping argument layout");
        return Ok(0);
    }

    let args_symbol = target.args_base_symbol.as_str();
    let (symbol, load) = table.placement(args_symbol).ok_or_else(|| {
        Error::map_resolution(format!("no load address for '{}'", args_symbol))
    })?;
    let base = load.checked_sub(target.ram_base).ok_or_else(|| {
        Error::map_resolution(format!(
            "'{}' at 0x{:X} lies below RAM base 0x{:X}",
            args_symbol, load, target.ram_base
        ))
    })?;
    info!("Argument overlay at 0x{:X}", base);

    let mut placed = 0;
    for id in tree.preorder() {
        for procedure in tree.module_mut(id).procedures.values_mut() {
            for argument in procedure.arguments.values_mut() {
                let data = &mut argument.data;
                data.symbol = Some(symbol.clone());
                data.base_address = Some(ResolvedAddress::Address(base));
                data.address = Some(ResolvedAddress::Address(base + data.offset));
                placed += 1;
            }
        }
    }

    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModulePath;

    fn tree_with_argument(offset: u64) -> ModuleTree {
        let mut tree = ModuleTree::new();
        let id = tree.get_or_create(&ModulePath::parse("Foo").unwrap());
        tree.module_mut(id)
            .procedure_mut("reset")
            .argument_mut("level")
            .data
            .offset = offset;
        tree
    }

    #[test]
    fn test_arguments_share_overlay() {
        let target = TargetConfig::default();
        let mut table = SymbolAddressTable::default();
        table.insert("_ZN4args", &target.args_base_symbol, 0x0080_0200);

        let mut tree = tree_with_argument(3);
        assert_eq!(resolve_arguments(&mut tree, &table, &target).unwrap(), 1);

        let foo = tree.module(tree.roots().next().unwrap());
        let data = &foo.procedures["reset"].arguments["level"].data;
        assert_eq!(data.base_address, Some(ResolvedAddress::Address(0x200)));
        assert_eq!(data.address, Some(ResolvedAddress::Address(0x203)));
        let symbol = data.symbol.as_ref().unwrap();
        assert_eq!(symbol.mangled, "_ZN4args");
        assert_eq!(symbol.unmangled, target.args_base_symbol);
    }

    #[test]
    fn test_missing_overlay_is_fatal() {
        let target = TargetConfig::default();
        let mut tree = tree_with_argument(0);

        let table = SymbolAddressTable::default();
        let err = resolve_arguments(&mut tree, &table, &target).unwrap_err();
        assert!(matches!(err, Error::MapResolution(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_no_procedures_needs_no_overlay() {
        let mut tree = ModuleTree::new();
        tree.get_or_create(&ModulePath::parse("Foo").unwrap());
        let placed =
            resolve_arguments(&mut tree, &SymbolAddressTable::default(), &TargetConfig::default())
                .unwrap();
        assert_eq!(placed, 0);
    }
}
