//! Captured toolchain answers for one object file
//!
//! A snapshot records everything the extractor asks a toolchain: the symbol
//! table, demangled names, per-symbol section payloads and relocation
//! records. It can be produced once by a build step and replayed any number
//! of times, which also makes it the fixture format for tests.

use fwmeta_core::SectionKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::common::{RelocationRecord, ToolchainIntrospector};
use crate::error::{ToolchainError, ToolchainResult};

/// In-memory [`ToolchainIntrospector`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSnapshot {
    /// Mangled symbol names in table order
    pub symbols: Vec<String>,
    /// Mangled name -> demangled name; names missing here are not mangled
    pub demangled: IndexMap<String, String>,
    /// Per-symbol section payloads, hex encoded
    pub sections: SectionPayloads,
    /// Relocation records in object order
    pub relocations: Vec<RelocationRecord>,
    /// Hex encoded object file, used for the firmware checksum
    pub object_image: Option<String>,
}

/// Hex encoded payloads keyed by symbol, one table per section kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPayloads {
    pub rodata: IndexMap<String, String>,
    pub data: IndexMap<String, String>,
    pub bss: IndexMap<String, String>,
}

impl SectionPayloads {
    fn table(&self, kind: SectionKind) -> &IndexMap<String, String> {
        match kind {
            SectionKind::ReadOnly => &self.rodata,
            SectionKind::Initialized => &self.data,
            SectionKind::ZeroInitialized => &self.bss,
        }
    }

    fn table_mut(&mut self, kind: SectionKind) -> &mut IndexMap<String, String> {
        match kind {
            SectionKind::ReadOnly => &mut self.rodata,
            SectionKind::Initialized => &mut self.data,
            SectionKind::ZeroInitialized => &mut self.bss,
        }
    }
}

impl ArtifactSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> ToolchainResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)
            .map_err(|e| ToolchainError::invalid_snapshot(e.to_string()))?;
        debug!(
            "Loaded snapshot {:?}: {} symbols, {} relocations",
            path,
            snapshot.symbols.len(),
            snapshot.relocations.len()
        );
        Ok(snapshot)
    }

    /// Save the snapshot as pretty JSON
    pub fn save(&self, path: &Path) -> ToolchainResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ToolchainError::invalid_snapshot(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add a symbol to the table together with its demangled name
    pub fn with_symbol(
        mut self,
        mangled: impl Into<String>,
        demangled: impl Into<String>,
    ) -> Self {
        let mangled = mangled.into();
        let demangled = demangled.into();
        if mangled != demangled {
            self.demangled.insert(mangled.clone(), demangled);
        }
        self.symbols.push(mangled);
        self
    }

    /// Record a demangled name without adding the symbol to the table
    pub fn with_demangled(
        mut self,
        mangled: impl Into<String>,
        demangled: impl Into<String>,
    ) -> Self {
        self.demangled.insert(mangled.into(), demangled.into());
        self
    }

    /// Add a payload for `symbol` in a section of the given kind
    pub fn with_payload(
        mut self,
        kind: SectionKind,
        symbol: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        self.sections
            .table_mut(kind)
            .insert(symbol.into(), hex::encode(bytes));
        self
    }

    /// Add a relocation record
    pub fn with_relocation(
        mut self,
        container: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        self.relocations.push(RelocationRecord::new(container, reference));
        self
    }

    /// Attach the raw object file
    pub fn with_object_image(mut self, bytes: &[u8]) -> Self {
        self.object_image = Some(hex::encode(bytes));
        self
    }
}

impl ToolchainIntrospector for ArtifactSnapshot {
    fn symbols(&self) -> ToolchainResult<Vec<String>> {
        Ok(self.symbols.clone())
    }

    fn demangle(&self, name: &str) -> ToolchainResult<String> {
        let demangled = self
            .demangled
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);

        if demangled.is_empty() {
            return Err(ToolchainError::EmptyDemangle(name.to_string()));
        }
        Ok(demangled.to_string())
    }

    fn section_bytes(&self, kind: SectionKind, symbol: &str) -> ToolchainResult<Option<Vec<u8>>> {
        match self.sections.table(kind).get(symbol) {
            Some(encoded) => hex::decode(encoded)
                .map(Some)
                .map_err(|source| ToolchainError::InvalidHex {
                    symbol: kind.section_name(symbol),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn relocations(&self) -> ToolchainResult<Vec<RelocationRecord>> {
        Ok(self.relocations.clone())
    }

    fn object_image(&self) -> ToolchainResult<Option<Vec<u8>>> {
        match &self.object_image {
            Some(encoded) => hex::decode(encoded)
                .map(Some)
                .map_err(|source| ToolchainError::InvalidHex {
                    symbol: "<object image>".to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}
