//! Relocation resolver
//!
//! A `callable` or `address` field is a pointer initialised at link time,
//! so the object keeps a relocation record for it. The record's target
//! names the code or data symbol the field points at.

use std::collections::HashMap;

use fwmeta_core::config::SectionConfig;
use fwmeta_core::Result;
use fwmeta_toolchain::RelocationRecord;
use tracing::debug;

use crate::classify::{ClassifiedSymbol, SymbolRole};
use crate::demangle::Demangler;
use crate::model::Callable;
use crate::tree::ModuleTree;

/// Decoded target column of a relocation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationTarget {
    /// `.text.<symbol>`
    Code { symbol: String },
    /// `.data.<symbol>[+<hex offset>]` or `.bss.<symbol>[+<hex offset>]`
    Data { symbol: String, offset: u64 },
}

/// Parse a relocation target; anything that is neither code nor data is `None`
pub fn parse_reference(target: &str, sections: &SectionConfig) -> Option<RelocationTarget> {
    for prefix in &sections.code_prefixes {
        if let Some((symbol, _)) = split_section(target, prefix) {
            return Some(RelocationTarget::Code {
                symbol: symbol.to_string(),
            });
        }
    }

    for prefix in &sections.data_prefixes {
        let Some((symbol, rest)) = split_section(target, prefix) else {
            continue;
        };
        let offset = match rest.strip_prefix('+') {
            Some(hex) => parse_hex(hex)?,
            None => 0,
        };
        return Some(RelocationTarget::Data {
            symbol: symbol.to_string(),
            offset,
        });
    }

    None
}

/// Split `<prefix>.<symbol><rest>` into symbol and rest
fn split_section<'t>(target: &'t str, prefix: &str) -> Option<(&'t str, &'t str)> {
    let rest = target.strip_prefix(prefix)?.strip_prefix('.')?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some((&rest[..end], &rest[end..]))
}

fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

/// Attach callables and data base symbols to the tree; returns how many
/// records were applied
pub(crate) fn resolve_relocations(
    tree: &mut ModuleTree,
    classified: &[ClassifiedSymbol],
    records: &[RelocationRecord],
    sections: &SectionConfig,
    demangler: &mut Demangler<'_>,
) -> Result<usize> {
    let pointer_fields: HashMap<&str, &SymbolRole> = classified
        .iter()
        .filter(|symbol| symbol.role.is_reference_field())
        .map(|symbol| (symbol.name.mangled.as_str(), &symbol.role))
        .collect();

    let mut applied = 0;
    for record in records {
        let Some(role) = pointer_fields.get(record.container_symbol()) else {
            continue;
        };

        let target = record
            .reference_target()
            .and_then(|target| parse_reference(target, sections));
        let Some(target) = target else {
            debug!(
                "Ignoring relocation of {}: unrecognised target '{}'",
                record.container, record.reference
            );
            continue;
        };

        let symbol = match &target {
            RelocationTarget::Code { symbol } | RelocationTarget::Data { symbol, .. } => {
                demangler.symbol(symbol)?
            }
        };

        let Some(node) = tree.target_mut(role) else {
            continue;
        };
        let kind = node.kind();

        let accepted = match target {
            RelocationTarget::Code { .. } => node.set_callable(Callable::new(symbol)),
            RelocationTarget::Data { offset, .. } => match node.data_mut() {
                Some(data) => {
                    data.symbol = Some(symbol);
                    data.offset = offset;
                    true
                }
                None => false,
            },
        };

        if accepted {
            applied += 1;
        } else {
            debug!(
                "Ignoring relocation of {}: a {} cannot hold '{}'",
                record.container, kind, record.reference
            );
        }
    }

    Ok(applied)
}
