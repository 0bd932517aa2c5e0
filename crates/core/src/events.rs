//! Pipeline passes and the diagnostics they record

use serde::{Deserialize, Serialize};

/// The extraction passes, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pass {
    Classify,
    BuildTree,
    Relocations,
    Payloads,
    MapAddresses,
    ArgumentLayout,
    Inheritance,
    Serialize,
}

impl Pass {
    /// Every pass in the order the pipeline runs them
    pub const ALL: [Pass; 8] = [
        Pass::Classify,
        Pass::BuildTree,
        Pass::Relocations,
        Pass::Payloads,
        Pass::MapAddresses,
        Pass::ArgumentLayout,
        Pass::Inheritance,
        Pass::Serialize,
    ];
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Classify => write!(f, "classify"),
            Pass::BuildTree => write!(f, "build-tree"),
            Pass::Relocations => write!(f, "relocations"),
            Pass::Payloads => write!(f, "payloads"),
            Pass::MapAddresses => write!(f, "map-addresses"),
            Pass::ArgumentLayout => write!(f, "argument-layout"),
            Pass::Inheritance => write!(f, "inheritance"),
            Pass::Serialize => write!(f, "serialize"),
        }
    }
}

/// A per-symbol failure that did not stop the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub pass: Pass,
    pub symbol: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(pass: Pass, symbol: impl Into<String>, error: &crate::Error) -> Self {
        Self {
            pass,
            symbol: symbol.into(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.pass, self.symbol, self.message)
    }
}
