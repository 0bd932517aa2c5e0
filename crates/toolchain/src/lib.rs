//! Toolchain collaborators for firmware model extraction
//!
//! The extractor never talks to binutils directly. It asks a
//! [`ToolchainIntrospector`] for symbols, demangled names, section payloads
//! and relocation records, and a [`LinkerMapReader`] for final load
//! addresses.

pub mod common;
pub mod error;
pub mod map;
pub mod snapshot;

pub use common::{RelocationRecord, ToolchainIntrospector};
pub use error::{ToolchainError, ToolchainResult};
pub use map::{GnuLdMapReader, LinkerMapReader, MapEntry, MapSection};
pub use snapshot::ArtifactSnapshot;

use std::path::Path;

/// Load a captured toolchain snapshot from a JSON file
pub fn load_snapshot(path: &Path) -> ToolchainResult<ArtifactSnapshot> {
    ArtifactSnapshot::load(path)
}

/// Read and parse a GNU ld map file
pub fn read_map_file(path: &Path) -> ToolchainResult<Vec<MapEntry>> {
    let text = std::fs::read_to_string(path)?;
    GnuLdMapReader::new().entries(&text)
}
