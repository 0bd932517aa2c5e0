//! Demangling with a per-run cache

use std::collections::HashMap;

use fwmeta_core::{Error, Result, SymbolName};
use fwmeta_toolchain::ToolchainIntrospector;

/// Demangles through the toolchain, asking at most once per name
pub(crate) struct Demangler<'a> {
    toolchain: &'a dyn ToolchainIntrospector,
    cache: HashMap<String, String>,
}

impl<'a> Demangler<'a> {
    pub(crate) fn new(toolchain: &'a dyn ToolchainIntrospector) -> Self {
        Self {
            toolchain,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn demangle(&mut self, mangled: &str) -> Result<String> {
        if let Some(hit) = self.cache.get(mangled) {
            return Ok(hit.clone());
        }

        let demangled = self
            .toolchain
            .demangle(mangled)
            .map_err(|e| Error::toolchain(e.to_string()))?;
        self.cache.insert(mangled.to_string(), demangled.clone());
        Ok(demangled)
    }

    pub(crate) fn symbol(&mut self, mangled: &str) -> Result<SymbolName> {
        let unmangled = self.demangle(mangled)?;
        Ok(SymbolName::new(mangled, unmangled))
    }
}
