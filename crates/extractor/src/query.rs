//! Lookups on a loaded model document
//!
//! Host tools address modules and their members by qualified name, e.g.
//! `LEDControl::Effects::brightness`.

use fwmeta_core::{Error, Result};
use std::path::Path;
use tracing::debug;

use crate::output::{InputDocument, ModelDocument, ModuleDocument, OutputFormat, ProcedureDocument};

impl ModelDocument {
    /// Read a document written by [`ModelDocument::write_to_file`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let document: Self = match OutputFormat::from_path(path)? {
            OutputFormat::Json => {
                serde_json::from_str(&content).map_err(|e| Error::parse(e.to_string()))?
            }
            OutputFormat::Yaml => {
                serde_yaml::from_str(&content).map_err(|e| Error::parse(e.to_string()))?
            }
        };
        debug!("Loaded model {:?} with {} top-level modules", path, document.modules.len());
        Ok(document)
    }

    /// Module at a `::`-separated path
    pub fn find_module(&self, path: &str) -> Result<&ModuleDocument> {
        let segments: Vec<&str> = path.split("::").collect();
        self.module_at(&segments)
    }

    pub fn find_input(&self, qualified: &str) -> Result<&InputDocument> {
        let (module_path, name) = split_member(qualified, "input")?;
        let module = self.module_at(&module_path)?;
        module
            .inputs
            .iter()
            .find(|input| input.name == name)
            .ok_or_else(|| {
                Error::not_found(format!("input '{}' in module '{}'", name, module_path.join("::")))
            })
    }

    pub fn find_procedure(&self, qualified: &str) -> Result<&ProcedureDocument> {
        let (module_path, name) = split_member(qualified, "procedure")?;
        let module = self.module_at(&module_path)?;
        module
            .procedures
            .iter()
            .find(|procedure| procedure.name == name)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "procedure '{}' in module '{}'",
                    name,
                    module_path.join("::")
                ))
            })
    }

    fn module_at(&self, segments: &[&str]) -> Result<&ModuleDocument> {
        let mut modules = &self.modules;
        let mut found: Option<&ModuleDocument> = None;

        for segment in segments {
            let module = modules
                .iter()
                .find(|m| m.name == *segment)
                .ok_or_else(|| Error::not_found(format!("module path '{}'", segments.join("::"))))?;
            modules = &module.modules;
            found = Some(module);
        }

        found.ok_or_else(|| Error::not_found("empty module path"))
    }
}

/// Split `A::B::member` into the module path and the member name
fn split_member<'q>(qualified: &'q str, what: &str) -> Result<(Vec<&'q str>, &'q str)> {
    let mut segments: Vec<&str> = qualified.split("::").collect();
    if segments.len() < 2 {
        return Err(Error::parse(format!(
            "{} name '{}' needs a module path",
            what, qualified
        )));
    }
    let name = segments.pop().unwrap_or_default();
    Ok((segments, name))
}
