//! Firmware model extraction
//!
//! Rebuilds the module / input / procedure tree a firmware exports for
//! introspection, using only its build artifacts: the symbol table, the
//! relocation records and the linker map. See [`ModelExtractor`] for the
//! pass structure.

pub mod address;
pub mod arguments;
pub mod checksum;
pub mod classify;
mod demangle;
pub mod descriptive;
pub mod inheritance;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod relocation;
pub mod tree;

pub use checksum::FirmwareChecksum;
pub use classify::{ClassifiedSymbol, SymbolClassifier, SymbolRole};
pub use model::{
    Callable, DataEntity, Input, Module, ModuleId, ModulePath, Procedure, ProcedureArgument,
};
pub use output::{ModelDocument, OutputFormat};
pub use pipeline::{Extraction, ExtractionStatistics, ModelExtractor};
pub use tree::ModuleTree;

use fwmeta_core::{Config, Result};
use std::path::Path;

/// Extract the model from a toolchain snapshot and a GNU ld map file
pub fn extract(snapshot_path: &Path, map_path: &Path, config: &Config) -> Result<Extraction> {
    ModelExtractor::from_files(snapshot_path, map_path, config.clone())?.run()
}
