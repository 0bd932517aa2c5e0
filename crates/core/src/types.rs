//! Common types used throughout the workspace

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Textual form of [`ResolvedAddress::Unexported`] in documents
pub const UNEXPORTED: &str = "unexported";

/// A final runtime address, or the marker for a symbol the linker dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedAddress {
    Address(u64),
    Unexported,
}

impl ResolvedAddress {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Address(addr) => Some(*addr),
            Self::Unexported => None,
        }
    }

    pub fn is_unexported(&self) -> bool {
        matches!(self, Self::Unexported)
    }
}

impl std::fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(addr) => write!(f, "0x{:X}", addr),
            Self::Unexported => f.write_str(UNEXPORTED),
        }
    }
}

impl From<u64> for ResolvedAddress {
    fn from(value: u64) -> Self {
        Self::Address(value)
    }
}

impl Serialize for ResolvedAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Address(addr) => serializer.serialize_u64(*addr),
            Self::Unexported => serializer.serialize_str(UNEXPORTED),
        }
    }
}

impl<'de> Deserialize<'de> for ResolvedAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(addr) => Ok(Self::Address(addr)),
            Repr::Text(text) if text == UNEXPORTED => Ok(Self::Unexported),
            Repr::Text(text) => Err(serde::de::Error::custom(format!(
                "expected an address or '{}', got '{}'",
                UNEXPORTED, text
            ))),
        }
    }
}

/// Primitive storage kinds an input or argument can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    #[serde(rename = "uint8_t")]
    U8,
    #[serde(rename = "uint16_t")]
    U16,
    #[serde(rename = "uint32_t")]
    U32,
    #[serde(rename = "int8_t")]
    I8,
    #[serde(rename = "int16_t")]
    I16,
    #[serde(rename = "int32_t")]
    I32,
    #[serde(rename = "float")]
    F32,
}

impl PrimitiveType {
    /// The firmware's type id table, indexed by the type byte
    pub const DEFAULT_TABLE: [PrimitiveType; 7] = [
        Self::U8,
        Self::U16,
        Self::U32,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::F32,
    ];

    pub fn c_name(&self) -> &'static str {
        match self {
            Self::U8 => "uint8_t",
            Self::U16 => "uint16_t",
            Self::U32 => "uint32_t",
            Self::I8 => "int8_t",
            Self::I16 => "int16_t",
            Self::I32 => "int32_t",
            Self::F32 => "float",
        }
    }

    /// Storage width in bytes
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }

    /// Check that a textual value can be stored in this type
    pub fn check_value(&self, text: &str) -> Result<()> {
        let text = text.trim();

        let (lower, upper): (i64, i64) = match self {
            Self::U8 => (0, u8::MAX as i64),
            Self::U16 => (0, u16::MAX as i64),
            Self::U32 => (0, u32::MAX as i64),
            Self::I8 => (i8::MIN as i64, i8::MAX as i64),
            Self::I16 => (i16::MIN as i64, i16::MAX as i64),
            Self::I32 => (i32::MIN as i64, i32::MAX as i64),
            Self::F32 => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| Error::parse(format!("'{}' is not a number", text)))?;
                if !value.is_finite() || value.abs() > f32::MAX as f64 {
                    return Err(Error::parse(format!(
                        "value {} exceeds the range of type {}",
                        text,
                        self.c_name()
                    )));
                }
                return Ok(());
            }
        };

        let value: i64 = text
            .parse()
            .map_err(|_| Error::parse(format!("'{}' is not an integer", text)))?;
        if value < lower || value > upper {
            return Err(Error::parse(format!(
                "value {} exceeds data range [{};{}] of type {}",
                value,
                lower,
                upper,
                self.c_name()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Storage section kinds a literal payload can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    /// Read-only constants (`.rodata`)
    ReadOnly,
    /// Initialized data (`.data`)
    Initialized,
    /// Zero-initialized data (`.bss`)
    ZeroInitialized,
}

impl SectionKind {
    pub fn section_prefix(&self) -> &'static str {
        match self {
            Self::ReadOnly => ".rodata",
            Self::Initialized => ".data",
            Self::ZeroInitialized => ".bss",
        }
    }

    /// Name of the per-symbol section holding `symbol`
    pub fn section_name(&self, symbol: &str) -> String {
        format!("{}.{}", self.section_prefix(), symbol)
    }
}

/// A symbol in both its mangled and demangled spelling
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolName {
    pub mangled: String,
    pub unmangled: String,
}

impl SymbolName {
    pub fn new(mangled: impl Into<String>, unmangled: impl Into<String>) -> Self {
        Self {
            mangled: mangled.into(),
            unmangled: unmangled.into(),
        }
    }
}

impl std::fmt::Display for SymbolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.unmangled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_address_serialization() {
        let json = serde_json::to_string(&ResolvedAddress::Address(0x120)).unwrap();
        assert_eq!(json, "288");

        let json = serde_json::to_string(&ResolvedAddress::Unexported).unwrap();
        assert_eq!(json, "\"unexported\"");

        let back: ResolvedAddress = serde_json::from_str("\"unexported\"").unwrap();
        assert!(back.is_unexported());
        assert!(serde_json::from_str::<ResolvedAddress>("\"elsewhere\"").is_err());
    }

    #[test]
    fn test_default_type_table() {
        assert_eq!(PrimitiveType::DEFAULT_TABLE[0], PrimitiveType::U8);
        assert_eq!(PrimitiveType::DEFAULT_TABLE[6], PrimitiveType::F32);
        assert_eq!(
            serde_json::to_string(&PrimitiveType::I16).unwrap(),
            "\"int16_t\""
        );
    }

    #[test]
    fn test_check_value_ranges() {
        assert!(PrimitiveType::U8.check_value("255").is_ok());
        assert!(PrimitiveType::U8.check_value("256").is_err());
        assert!(PrimitiveType::U8.check_value("-1").is_err());
        assert!(PrimitiveType::I16.check_value("-32768").is_ok());
        assert!(PrimitiveType::I16.check_value("32768").is_err());
        assert!(PrimitiveType::U32.check_value("4294967295").is_ok());
        assert!(PrimitiveType::F32.check_value("-1.5").is_ok());
        assert!(PrimitiveType::F32.check_value("1e39").is_err());
        assert!(PrimitiveType::I32.check_value("twelve").is_err());
    }

    #[test]
    fn test_section_names() {
        assert_eq!(
            SectionKind::ReadOnly.section_name("_ZN3Foo4descE"),
            ".rodata._ZN3Foo4descE"
        );
        assert_eq!(SectionKind::ZeroInitialized.section_prefix(), ".bss");
    }
}
