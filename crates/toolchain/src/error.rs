//! Error types for toolchain access

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid hex payload for '{symbol}': {source}")]
    InvalidHex {
        symbol: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("Demangler returned nothing for '{0}'")]
    EmptyDemangle(String),

    #[error("Linker map has no 'Linker script and memory map' section")]
    MissingMemoryMap,

    #[error("Malformed linker map at line {line}: {reason}")]
    MalformedMap { line: usize, reason: String },
}

pub type ToolchainResult<T> = std::result::Result<T, ToolchainError>;

impl ToolchainError {
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    pub fn malformed_map(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedMap {
            line,
            reason: reason.into(),
        }
    }
}
