//! In-memory model of the firmware's introspectable surface
//!
//! Modules live in the [`ModuleTree`](crate::tree::ModuleTree) arena and
//! refer to their parent by [`ModuleId`]; inputs, procedures and arguments
//! are owned by value by the node that declares them.

use fwmeta_core::{PrimitiveType, ResolvedAddress, SymbolName};
use indexmap::IndexMap;

/// Index of a module in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

/// A module path such as `LEDControl::Effects`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModulePath {
    segments: Vec<String>,
    joined: String,
}

impl ModulePath {
    /// Split a `::`-separated path; empty paths and empty segments are rejected
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path.split("::").map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            joined: path.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.joined
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined)
    }
}

/// A reference to executable code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    pub symbol: SymbolName,
    /// Instruction-space address, set by the map pass
    pub address: Option<ResolvedAddress>,
    /// Copied from an ancestor module rather than declared directly
    pub inherited: bool,
}

impl Callable {
    pub fn new(symbol: SymbolName) -> Self {
        Self {
            symbol,
            address: None,
            inherited: false,
        }
    }

    /// Independent copy flagged as inherited; the source keeps its own flag
    pub fn inherited_copy(&self) -> Self {
        Self {
            symbol: self.symbol.clone(),
            address: self.address,
            inherited: true,
        }
    }
}

/// A reference to a storage location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataEntity {
    /// Symbol the location is relative to
    pub symbol: Option<SymbolName>,
    /// Byte offset from the base symbol
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
    pub primitive: Option<PrimitiveType>,
    pub address: Option<ResolvedAddress>,
    pub base_address: Option<ResolvedAddress>,
}

impl DataEntity {
    pub fn mark_unexported(&mut self) {
        self.address = Some(ResolvedAddress::Unexported);
        self.base_address = Some(ResolvedAddress::Unexported);
    }
}

/// A settable value owned by a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub name: String,
    pub description: String,
    pub data: DataEntity,
    pub callable: Option<Callable>,
    /// Declared the no-op sentinel as its callable; never inherits one
    pub update_suppressed: bool,
}

impl Input {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data: DataEntity::default(),
            callable: None,
            update_suppressed: false,
        }
    }
}

/// One argument of a procedure, laid out in the shared argument overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureArgument {
    pub name: String,
    pub description: String,
    pub data: DataEntity,
}

impl ProcedureArgument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data: DataEntity::default(),
        }
    }
}

/// An invokable operation of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    pub name: String,
    pub description: String,
    pub callable: Option<Callable>,
    pub arguments: IndexMap<String, ProcedureArgument>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            callable: None,
            arguments: IndexMap::new(),
        }
    }

    pub fn argument_mut(&mut self, name: &str) -> &mut ProcedureArgument {
        self.arguments
            .entry(name.to_string())
            .or_insert_with(|| ProcedureArgument::new(name))
    }
}

/// A node of the module hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub path: String,
    pub description: String,
    pub callable: Option<Callable>,
    /// Declared the no-op sentinel; descendants do not inherit past it
    pub update_suppressed: bool,
    /// Non-owning link to the enclosing module
    pub parent: Option<ModuleId>,
    pub modules: IndexMap<String, ModuleId>,
    pub inputs: IndexMap<String, Input>,
    pub procedures: IndexMap<String, Procedure>,
}

impl Module {
    pub(crate) fn new(name: &str, path: String, parent: Option<ModuleId>) -> Self {
        Self {
            name: name.to_string(),
            path,
            description: String::new(),
            callable: None,
            update_suppressed: false,
            parent,
            modules: IndexMap::new(),
            inputs: IndexMap::new(),
            procedures: IndexMap::new(),
        }
    }

    pub fn input_mut(&mut self, name: &str) -> &mut Input {
        self.inputs
            .entry(name.to_string())
            .or_insert_with(|| Input::new(name))
    }

    pub fn procedure_mut(&mut self, name: &str) -> &mut Procedure {
        self.procedures
            .entry(name.to_string())
            .or_insert_with(|| Procedure::new(name))
    }
}
