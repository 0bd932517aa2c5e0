//! Descriptive-data extractor
//!
//! Literal fields (descriptions, sizes, type ids, argument offsets) are
//! emitted by the compiler as constants in a section named after the
//! symbol. This pass fetches those bytes and decodes them into the tree.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use fwmeta_core::config::{SectionConfig, TargetConfig};
use fwmeta_core::{Diagnostic, Error, Pass, PrimitiveType, Result, SectionKind};
use fwmeta_toolchain::ToolchainIntrospector;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::classify::ClassifiedSymbol;
use crate::tree::ModuleTree;

/// Literal field kinds and how their bytes are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadField {
    /// NUL-terminated text
    Description,
    /// Little-endian `u16` byte count
    Size,
    /// One-byte index into the type table
    Type,
    /// One-byte offset into the argument overlay
    Offset,
}

/// A decoded literal
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Description(String),
    Size(u64),
    Type(PrimitiveType),
    Offset(u64),
}

/// Text up to a trailing terminator; invalid UTF-8 is replaced
pub fn decode_description(bytes: &[u8]) -> String {
    let text = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    String::from_utf8_lossy(text).into_owned()
}

/// `b0 + 256 * b1`; a single byte is the whole value
pub fn decode_size(symbol: &str, bytes: &[u8]) -> Result<u64> {
    match bytes.len() {
        0 => Err(Error::classification(symbol, "empty size payload")),
        1 => Ok(u64::from(bytes[0])),
        _ => {
            let mut cursor = Cursor::new(bytes);
            let size = cursor
                .read_u16::<LittleEndian>()
                .map_err(|e| Error::classification(symbol, e.to_string()))?;
            Ok(u64::from(size))
        }
    }
}

pub fn decode_type(symbol: &str, bytes: &[u8], table: &[PrimitiveType]) -> Result<PrimitiveType> {
    let index = *bytes
        .first()
        .ok_or_else(|| Error::classification(symbol, "empty type payload"))?;
    table.get(usize::from(index)).copied().ok_or_else(|| {
        Error::classification(
            symbol,
            format!("type id {} outside table of {} types", index, table.len()),
        )
    })
}

pub fn decode_offset(symbol: &str, bytes: &[u8]) -> Result<u64> {
    bytes
        .first()
        .map(|b| u64::from(*b))
        .ok_or_else(|| Error::classification(symbol, "empty offset payload"))
}

pub fn decode_payload(
    field: PayloadField,
    symbol: &str,
    bytes: &[u8],
    table: &[PrimitiveType],
) -> Result<Payload> {
    Ok(match field {
        PayloadField::Description => Payload::Description(decode_description(bytes)),
        PayloadField::Size => Payload::Size(decode_size(symbol, bytes)?),
        PayloadField::Type => Payload::Type(decode_type(symbol, bytes, table)?),
        PayloadField::Offset => Payload::Offset(decode_offset(symbol, bytes)?),
    })
}

/// Find and decode the payload of one symbol
///
/// A toolchain failure is fatal and comes back as the outer error; a
/// missing section or an undecodable payload only affects this symbol.
fn fetch(
    toolchain: &dyn ToolchainIntrospector,
    symbol: &ClassifiedSymbol,
    field: PayloadField,
    priority: &[SectionKind],
    table: &[PrimitiveType],
) -> Result<Result<Payload>> {
    let mangled = symbol.name.mangled.as_str();
    let found = toolchain
        .find_payload(mangled, priority)
        .map_err(|e| Error::toolchain(e.to_string()))?;

    Ok(match found {
        Some((kind, bytes)) => {
            debug!("{} payload of {} in {}", bytes.len(), mangled, kind.section_prefix());
            decode_payload(field, mangled, &bytes, table)
        }
        None => Err(Error::section_lookup(mangled)),
    })
}

/// Fetch, decode and store every literal field; returns the number stored
pub(crate) fn extract_payloads(
    tree: &mut ModuleTree,
    classified: &[ClassifiedSymbol],
    toolchain: &dyn ToolchainIntrospector,
    target: &TargetConfig,
    sections: &SectionConfig,
    parallel: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<usize> {
    let jobs: Vec<(&ClassifiedSymbol, PayloadField)> = classified
        .iter()
        .filter_map(|symbol| symbol.role.payload_field().map(|field| (symbol, field)))
        .collect();

    let priority = sections.payload_priority.as_slice();
    let table = target.type_table.as_slice();

    let results: Vec<Result<Result<Payload>>> = if parallel {
        jobs.par_iter()
            .map(|(symbol, field)| fetch(toolchain, symbol, *field, priority, table))
            .collect()
    } else {
        jobs.iter()
            .map(|(symbol, field)| fetch(toolchain, symbol, *field, priority, table))
            .collect()
    };

    let mut stored = 0;
    for ((symbol, _), result) in jobs.iter().zip(results) {
        let payload = match result? {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{}", e);
                diagnostics.push(Diagnostic::new(Pass::Payloads, &symbol.name.mangled, &e));
                continue;
            }
        };

        let Some(node) = tree.target_mut(&symbol.role) else {
            continue;
        };
        match payload {
            Payload::Description(text) => node.set_description(text),
            Payload::Size(size) => {
                if let Some(data) = node.data_mut() {
                    data.size = size;
                }
            }
            Payload::Type(primitive) => {
                if let Some(data) = node.data_mut() {
                    data.primitive = Some(primitive);
                }
            }
            Payload::Offset(offset) => {
                if let Some(data) = node.data_mut() {
                    data.offset = offset;
                }
            }
        }
        stored += 1;
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ArgumentField, InputField, SymbolRole};
    use crate::model::ModulePath;
    use fwmeta_core::SymbolName;
    use fwmeta_toolchain::ArtifactSnapshot;

    #[test]
    fn test_size_uses_256_multiplier() {
        assert_eq!(decode_size("s", &[0x10, 0x01]).unwrap(), 272);
        assert_eq!(decode_size("s", &[0xff, 0xff]).unwrap(), 65535);
        assert_eq!(decode_size("s", &[0x04]).unwrap(), 4);
        assert!(decode_size("s", &[]).is_err());
    }

    #[test]
    fn test_type_table_bounds() {
        let table = PrimitiveType::DEFAULT_TABLE;
        assert_eq!(decode_type("t", &[0], &table).unwrap(), PrimitiveType::U8);
        assert_eq!(decode_type("t", &[6], &table).unwrap(), PrimitiveType::F32);

        let err = decode_type("t", &[7], &table).unwrap_err();
        assert!(matches!(err, Error::Classification { .. }));
    }

    #[test]
    fn test_description_trims_terminator() {
        assert_eq!(decode_description(b"Brightness\0"), "Brightness");
        assert_eq!(decode_description(b"raw"), "raw");
        assert_eq!(decode_description(b""), "");
    }

    #[test]
    fn test_offset_is_first_byte() {
        assert_eq!(decode_offset("o", &[3, 9]).unwrap(), 3);
        assert!(decode_offset("o", &[]).is_err());
    }

    fn fixture() -> (ArtifactSnapshot, Vec<ClassifiedSymbol>) {
        let module = ModulePath::parse("Foo").unwrap();
        let snapshot = ArtifactSnapshot::new()
            .with_payload(SectionKind::ReadOnly, "_Zdesc", b"Level\0")
            .with_payload(SectionKind::Initialized, "_Zsize", &[0x10, 0x01])
            .with_payload(SectionKind::ReadOnly, "_Ztype", &[9])
            .with_payload(SectionKind::ZeroInitialized, "_Zoff", &[4]);

        let input = |field, mangled: &str| ClassifiedSymbol {
            name: SymbolName::new(mangled, mangled),
            role: SymbolRole::Input {
                module: module.clone(),
                input: "bar".to_string(),
                field,
            },
        };
        let classified = vec![
            input(InputField::Description, "_Zdesc"),
            input(InputField::Size, "_Zsize"),
            input(InputField::Type, "_Ztype"),
            input(InputField::Callable, "_Zcall"),
            ClassifiedSymbol {
                name: SymbolName::new("_Zoff", "_Zoff"),
                role: SymbolRole::Argument {
                    module: module.clone(),
                    procedure: "reset".to_string(),
                    argument: "level".to_string(),
                    field: ArgumentField::Offset,
                },
            },
            input(InputField::Description, "_Zmissing"),
        ];
        (snapshot, classified)
    }

    fn run(parallel: bool) -> (ModuleTree, Vec<Diagnostic>, usize) {
        let (snapshot, classified) = fixture();
        let mut tree = ModuleTree::new();
        let mut diagnostics = Vec::new();
        let stored = extract_payloads(
            &mut tree,
            &classified,
            &snapshot,
            &TargetConfig::default(),
            &SectionConfig::default(),
            parallel,
            &mut diagnostics,
        )
        .unwrap();
        (tree, diagnostics, stored)
    }

    #[test]
    fn test_extract_payloads_keeps_going() {
        let (tree, diagnostics, stored) = run(false);
        assert_eq!(stored, 3);

        let foo = tree.module(tree.find(&ModulePath::parse("Foo").unwrap()).unwrap());
        let bar = &foo.inputs["bar"];
        assert_eq!(bar.description, "Level");
        assert_eq!(bar.data.size, 272);
        assert_eq!(bar.data.primitive, None);
        assert_eq!(foo.procedures["reset"].arguments["level"].data.offset, 4);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].symbol, "_Ztype");
        assert_eq!(diagnostics[1].symbol, "_Zmissing");
        assert!(diagnostics.iter().all(|d| d.pass == Pass::Payloads));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (sequential, seq_diags, _) = run(false);
        let (parallel, par_diags, _) = run(true);
        assert_eq!(
            sequential.module(sequential.roots().next().unwrap()),
            parallel.module(parallel.roots().next().unwrap())
        );
        assert_eq!(seq_diags, par_diags);
    }
}
