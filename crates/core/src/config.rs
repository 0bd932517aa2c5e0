//! Extraction configuration
//!
//! Everything that depends on the target architecture or on the firmware's
//! naming convention lives here and is passed into the pipeline explicitly.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::types::{PrimitiveType, SectionKind};

/// Extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address-space constants of the target
    pub target: TargetConfig,
    /// Reserved tokens of the symbol naming grammar
    pub markers: MarkerTokens,
    /// Section naming used by relocation references and payload lookup
    pub sections: SectionConfig,
    /// Fetch and decode literal payloads on the rayon pool
    pub parallel_payloads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            markers: MarkerTokens::default(),
            sections: SectionConfig::default(),
            parallel_payloads: false,
        }
    }
}

/// Target architecture constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Load address at which data memory (SRAM) starts
    pub ram_base: u64,
    /// Bytes per instruction-space addressing unit
    pub instruction_unit: u64,
    /// Primitive types indexed by the type byte stored in the firmware
    pub type_table: Vec<PrimitiveType>,
    /// Demangled name of the function that stands for "no update"
    pub noop_callable: String,
    /// Demangled name of the overlay shared by all procedure arguments
    pub args_base_symbol: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            ram_base: 0x0080_0000,
            instruction_unit: 2,
            type_table: PrimitiveType::DEFAULT_TABLE.to_vec(),
            noop_callable: "kaleidoscope::module::_______noUpdate_______()".to_string(),
            args_base_symbol: "kaleidoscope::module::_______procedure_args_union_______"
                .to_string(),
        }
    }
}

/// Reserved marker tokens embedded in demangled symbol names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerTokens {
    /// Namespace every exported module lives in, including the trailing `::`
    pub namespace: String,
    pub module: String,
    pub info: String,
    pub inputs: String,
    pub procedure: String,
    pub arguments: String,
}

impl Default for MarkerTokens {
    fn default() -> Self {
        Self {
            namespace: "kaleidoscope::module::".to_string(),
            module: "_______module_______".to_string(),
            info: "_______info_______".to_string(),
            inputs: "_______inputs_______".to_string(),
            procedure: "_______procedure_______".to_string(),
            arguments: "_______arguments_______".to_string(),
        }
    }
}

/// Section naming conventions of the object file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Section prefixes whose relocation targets are code
    pub code_prefixes: Vec<String>,
    /// Section prefixes whose relocation targets are data
    pub data_prefixes: Vec<String>,
    /// Order in which payload sections are searched
    pub payload_priority: Vec<SectionKind>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            code_prefixes: vec![".text".to_string()],
            data_prefixes: vec![".data".to_string(), ".bss".to_string()],
            payload_priority: vec![
                SectionKind::ReadOnly,
                SectionKind::Initialized,
                SectionKind::ZeroInitialized,
            ],
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| crate::Error::parse(e.to_string()))?;
        config.validate()?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.instruction_unit == 0 {
            return Err(crate::Error::config("instruction_unit must be non-zero"));
        }
        if self.target.type_table.is_empty() {
            return Err(crate::Error::config("type_table must not be empty"));
        }
        if self.sections.payload_priority.is_empty() {
            return Err(crate::Error::config("payload_priority must not be empty"));
        }

        let markers = &self.markers;
        let tokens = [
            ("namespace", &markers.namespace),
            ("module", &markers.module),
            ("info", &markers.info),
            ("inputs", &markers.inputs),
            ("procedure", &markers.procedure),
            ("arguments", &markers.arguments),
        ];
        for (name, token) in tokens {
            if token.is_empty() {
                return Err(crate::Error::config(format!(
                    "marker token '{}' must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target.ram_base, 0x0080_0000);
        assert_eq!(config.target.type_table.len(), 7);
    }

    #[test]
    fn test_validate_rejects_zero_instruction_unit() {
        let mut config = Config::default();
        config.target.instruction_unit = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_marker() {
        let mut config = Config::default();
        config.markers.info.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwmeta.json");
        std::fs::write(&path, r#"{ "target": { "ram_base": 4096 } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.target.ram_base, 4096);
        assert_eq!(config.target.instruction_unit, 2);
        assert_eq!(config.markers, MarkerTokens::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwmeta.json");

        let mut config = Config::default();
        config.parallel_payloads = true;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
