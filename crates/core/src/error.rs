//! Error types for fwmeta

use thiserror::Error;

/// Main error type for model extraction
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Bad symbol grammar, unknown field name or an undecodable payload
    #[error("Classification error for '{symbol}': {reason}")]
    Classification { symbol: String, reason: String },

    /// A literal payload was found in none of the candidate sections
    #[error("No payload section found for symbol '{0}'")]
    SectionLookup(String),

    #[error("Map resolution error: {0}")]
    MapResolution(String),

    #[error("Toolchain error: {0}")]
    Toolchain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn classification(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Classification {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn section_lookup(symbol: impl Into<String>) -> Self {
        Self::SectionLookup(symbol.into())
    }

    pub fn map_resolution(msg: impl Into<String>) -> Self {
        Self::MapResolution(msg.into())
    }

    pub fn toolchain(msg: impl Into<String>) -> Self {
        Self::Toolchain(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error aborts a run.
    ///
    /// Classification and section lookup failures only affect the symbol
    /// they were raised for; everything else stops the pipeline before any
    /// output is produced.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Classification { .. } | Self::SectionLookup(_))
    }
}
