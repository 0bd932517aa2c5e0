//! Common traits and types for toolchain access

use fwmeta_core::SectionKind;
use serde::{Deserialize, Serialize};

use crate::ToolchainResult;

/// Answers the questions the extractor has about one compiled object
///
/// Implementations wrap whatever produces the answers: a binutils
/// installation, an object-file reader, or a captured [`ArtifactSnapshot`].
///
/// [`ArtifactSnapshot`]: crate::ArtifactSnapshot
pub trait ToolchainIntrospector: Send + Sync {
    /// All mangled symbol names of the object, in table order
    fn symbols(&self) -> ToolchainResult<Vec<String>>;

    /// Demangle a symbol name; names that are not mangled come back unchanged
    fn demangle(&self, name: &str) -> ToolchainResult<String>;

    /// Raw contents of the per-symbol section `<kind prefix>.<symbol>`
    fn section_bytes(&self, kind: SectionKind, symbol: &str) -> ToolchainResult<Option<Vec<u8>>>;

    /// Relocation records in object order
    fn relocations(&self) -> ToolchainResult<Vec<RelocationRecord>>;

    /// Raw bytes of the object file, if available
    fn object_image(&self) -> ToolchainResult<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Find the payload of `symbol`, searching section kinds in `priority` order
    fn find_payload(
        &self,
        symbol: &str,
        priority: &[SectionKind],
    ) -> ToolchainResult<Option<(SectionKind, Vec<u8>)>> {
        for kind in priority {
            if let Some(bytes) = self.section_bytes(*kind, symbol)? {
                return Ok(Some((*kind, bytes)));
            }
        }
        Ok(None)
    }
}

/// One relocation record: the section being relocated and the line that
/// names what it refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRecord {
    /// Relocated section, e.g. `.rodata._ZN3Foo4infoE`
    pub container: String,
    /// Record line, e.g. `00000000 R_AVR_16_PM .text._ZN3Foo6updateEv`
    pub reference: String,
}

impl RelocationRecord {
    pub fn new(container: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            reference: reference.into(),
        }
    }

    /// Symbol owning the relocated section (last `.`-separated token)
    pub fn container_symbol(&self) -> &str {
        self.container
            .rsplit('.')
            .next()
            .unwrap_or(self.container.as_str())
    }

    /// Target column of the record line (last whitespace-separated token)
    pub fn reference_target(&self) -> Option<&str> {
        self.reference.split_whitespace().last()
    }
}
