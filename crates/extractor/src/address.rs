//! Map-file address resolver
//!
//! Code lives in flash and is addressed in instruction units; data lives in
//! RAM, which the linker places at `ram_base` in its load address space.

use std::collections::HashMap;

use fwmeta_core::config::TargetConfig;
use fwmeta_core::{ResolvedAddress, Result, SymbolName};
use fwmeta_toolchain::MapEntry;
use tracing::{debug, warn};

use crate::demangle::Demangler;
use crate::model::{Callable, DataEntity};
use crate::tree::ModuleTree;

/// Load addresses of the linker map, by mangled and by demangled name
#[derive(Debug, Clone, Default)]
pub struct SymbolAddressTable {
    by_mangled: HashMap<String, u64>,
    /// Demangled name -> (mangled name, load address)
    by_unmangled: HashMap<String, (String, u64)>,
}

impl SymbolAddressTable {
    pub(crate) fn build(entries: &[MapEntry], demangler: &mut Demangler<'_>) -> Result<Self> {
        let mut table = Self::default();
        for entry in entries {
            let unmangled = demangler.demangle(&entry.symbol)?;
            table.insert(&entry.symbol, &unmangled, entry.load_address);
        }
        debug!("Address table holds {} symbols", table.by_mangled.len());
        Ok(table)
    }

    /// Record a placement; the first placement of a name wins
    pub fn insert(&mut self, mangled: &str, unmangled: &str, load_address: u64) {
        self.by_mangled
            .entry(mangled.to_string())
            .or_insert(load_address);
        self.by_unmangled
            .entry(unmangled.to_string())
            .or_insert_with(|| (mangled.to_string(), load_address));
    }

    /// Full symbol name and load address of a demangled name
    pub fn placement(&self, unmangled: &str) -> Option<(SymbolName, u64)> {
        self.by_unmangled
            .get(unmangled)
            .map(|(mangled, load)| (SymbolName::new(mangled.as_str(), unmangled), *load))
    }

    /// Demangled name first, then the mangled spelling
    pub fn lookup(&self, symbol: &SymbolName) -> Option<u64> {
        self.by_unmangled
            .get(&symbol.unmangled)
            .map(|(_, load)| *load)
            .or_else(|| self.by_mangled.get(&symbol.mangled).copied())
    }
}

/// Counters reported by the address pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressCounts {
    pub callables_resolved: usize,
    pub callables_unexported: usize,
    pub noop_discarded: usize,
    pub data_resolved: usize,
    pub data_unexported: usize,
}

/// Resolves callables and data entities against an address table
pub struct AddressResolver<'a> {
    table: &'a SymbolAddressTable,
    target: &'a TargetConfig,
    counts: AddressCounts,
}

impl<'a> AddressResolver<'a> {
    pub fn new(table: &'a SymbolAddressTable, target: &'a TargetConfig) -> Self {
        Self {
            table,
            target,
            counts: AddressCounts::default(),
        }
    }

    pub fn counts(&self) -> AddressCounts {
        self.counts
    }

    /// Resolve a callable in place; the no-op sentinel removes it and
    /// returns `true`
    pub fn resolve_callable(&mut self, slot: &mut Option<Callable>) -> bool {
        let Some(callable) = slot else {
            return false;
        };

        if callable.symbol.unmangled == self.target.noop_callable {
            debug!("Discarding no-op callable {}", callable.symbol.mangled);
            *slot = None;
            self.counts.noop_discarded += 1;
            return true;
        }

        match self.table.lookup(&callable.symbol) {
            Some(load) => {
                let address = load / self.target.instruction_unit;
                callable.address = Some(ResolvedAddress::Address(address));
                self.counts.callables_resolved += 1;
            }
            None => {
                callable.address = Some(ResolvedAddress::Unexported);
                self.counts.callables_unexported += 1;
            }
        }
        false
    }

    /// Resolve a data entity relative to `ram_base`
    pub fn resolve_data(&mut self, data: &mut DataEntity) {
        let Some(load) = data.symbol.as_ref().and_then(|s| self.table.lookup(s)) else {
            data.mark_unexported();
            self.counts.data_unexported += 1;
            return;
        };

        let Some(base) = load.checked_sub(self.target.ram_base) else {
            warn!(
                "Load address 0x{:X} of {} lies below RAM base 0x{:X}",
                load,
                data.symbol.as_ref().map(|s| s.unmangled.as_str()).unwrap_or(""),
                self.target.ram_base
            );
            data.mark_unexported();
            self.counts.data_unexported += 1;
            return;
        };

        let Some(address) = base.checked_add(data.offset) else {
            warn!(
                "Offset 0x{:X} from base 0x{:X} overflows the address space",
                data.offset, base
            );
            data.mark_unexported();
            self.counts.data_unexported += 1;
            return;
        };

        data.base_address = Some(ResolvedAddress::Address(base));
        data.address = Some(ResolvedAddress::Address(address));
        self.counts.data_resolved += 1;
    }

    /// One walk over the whole tree: module callables, input data and
    /// callables, procedure callables
    pub fn resolve_tree(&mut self, tree: &mut ModuleTree) {
        for id in tree.preorder() {
            let module = tree.module_mut(id);
            if self.resolve_callable(&mut module.callable) {
                module.update_suppressed = true;
            }

            for input in module.inputs.values_mut() {
                self.resolve_data(&mut input.data);
                if self.resolve_callable(&mut input.callable) {
                    input.update_suppressed = true;
                }
            }

            for procedure in module.procedures.values_mut() {
                self.resolve_callable(&mut procedure.callable);
            }
        }
    }
}
