//! Model document and its writers
//!
//! The document is a plain serde tree with fixed field names. Modules list
//! their own fields first, then inputs, procedures and child modules, each
//! in first-seen order.

use fwmeta_core::{Error, PrimitiveType, ResolvedAddress, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::{Callable, DataEntity, ModuleId};
use crate::tree::ModuleTree;

/// Top-level document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDocument {
    /// Hex encoded firmware checksum, when the object image was available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub modules: Vec<ModuleDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDocument {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callable: Option<CallableDocument>,
    #[serde(default)]
    pub inputs: Vec<InputDocument>,
    #[serde(default)]
    pub procedures: Vec<ProcedureDocument>,
    #[serde(default)]
    pub modules: Vec<ModuleDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDocument {
    pub name: String,
    pub description: String,
    pub data: DataDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callable: Option<CallableDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callable: Option<CallableDocument>,
    #[serde(default)]
    pub arguments: Vec<ArgumentDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDocument {
    pub name: String,
    pub description: String,
    pub data: DataDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableDocument {
    pub address: Option<ResolvedAddress>,
    pub symbol_mangled: String,
    pub symbol_unmangled: String,
    pub inherited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDocument {
    pub address: Option<ResolvedAddress>,
    pub base_address: Option<ResolvedAddress>,
    pub offset: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub primitive: Option<PrimitiveType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_mangled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_unmangled: Option<String>,
}

impl From<&Callable> for CallableDocument {
    fn from(callable: &Callable) -> Self {
        Self {
            address: callable.address,
            symbol_mangled: callable.symbol.mangled.clone(),
            symbol_unmangled: callable.symbol.unmangled.clone(),
            inherited: callable.inherited,
        }
    }
}

impl From<&DataEntity> for DataDocument {
    fn from(data: &DataEntity) -> Self {
        Self {
            address: data.address,
            base_address: data.base_address,
            offset: data.offset,
            size: data.size,
            primitive: data.primitive,
            symbol_mangled: data.symbol.as_ref().map(|s| s.mangled.clone()),
            symbol_unmangled: data.symbol.as_ref().map(|s| s.unmangled.clone()),
        }
    }
}

/// Document syntax, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(Error::config(format!(
                "cannot tell document format of {:?}, expected .json, .yaml or .yml",
                path
            ))),
        }
    }
}

/// Build the document for a fully resolved tree
pub fn serialize_tree(tree: &ModuleTree, checksum: Option<String>) -> ModelDocument {
    ModelDocument {
        checksum,
        modules: tree.roots().map(|id| module_document(tree, id)).collect(),
    }
}

fn module_document(tree: &ModuleTree, id: ModuleId) -> ModuleDocument {
    let module = tree.module(id);

    ModuleDocument {
        name: module.name.clone(),
        description: module.description.clone(),
        callable: module.callable.as_ref().map(CallableDocument::from),
        inputs: module
            .inputs
            .values()
            .map(|input| InputDocument {
                name: input.name.clone(),
                description: input.description.clone(),
                data: DataDocument::from(&input.data),
                callable: input.callable.as_ref().map(CallableDocument::from),
            })
            .collect(),
        procedures: module
            .procedures
            .values()
            .map(|procedure| ProcedureDocument {
                name: procedure.name.clone(),
                description: procedure.description.clone(),
                callable: procedure.callable.as_ref().map(CallableDocument::from),
                arguments: procedure
                    .arguments
                    .values()
                    .map(|argument| ArgumentDocument {
                        name: argument.name.clone(),
                        description: argument.description.clone(),
                        data: DataDocument::from(&argument.data),
                    })
                    .collect(),
            })
            .collect(),
        modules: module
            .modules
            .values()
            .map(|child| module_document(tree, *child))
            .collect(),
    }
}

impl ModelDocument {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::parse(e.to_string()))
    }

    /// Write the document as JSON or YAML, by file extension
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = match OutputFormat::from_path(path)? {
            OutputFormat::Json => self.to_json_pretty()?,
            OutputFormat::Yaml => self.to_yaml()?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}
