//! Core types and configuration for fwmeta
//!
//! This crate provides the foundational types shared by the toolchain
//! collaborators and the model extractor.

pub mod error;
pub mod types;
pub mod config;
pub mod events;

pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use events::{Diagnostic, Pass};
