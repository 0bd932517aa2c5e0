//! Linker map access
//!
//! The linker map is the only artifact that knows where retained symbols
//! finally landed. Every per-symbol input section that survived garbage
//! collection is listed with its load address.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ToolchainError, ToolchainResult};

/// Line that opens the memory map part of a GNU ld map file
const MEMORY_MAP_HEADER: &str = "Linker script and memory map";

/// Output section an entry was placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapSection {
    Text,
    Data,
    Bss,
}

impl MapSection {
    pub const ALL: [MapSection; 3] = [MapSection::Text, MapSection::Data, MapSection::Bss];

    pub fn prefix(&self) -> &'static str {
        match self {
            MapSection::Text => ".text.",
            MapSection::Data => ".data.",
            MapSection::Bss => ".bss.",
        }
    }
}

/// A retained symbol and its load address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub section: MapSection,
    pub symbol: String,
    pub load_address: u64,
}

/// Produces the ordered symbol placements of a linker map
pub trait LinkerMapReader {
    fn entries(&self, map_text: &str) -> ToolchainResult<Vec<MapEntry>>;
}

/// Reader for map files written by GNU ld (`-Map=<file>`)
#[derive(Debug, Clone, Copy, Default)]
pub struct GnuLdMapReader;

impl GnuLdMapReader {
    pub fn new() -> Self {
        Self
    }

    /// Match an input section line such as ` .data._ZN3Foo3barE`
    fn section_line(line: &str) -> Option<(MapSection, &str, &str)> {
        if !line.starts_with(char::is_whitespace) {
            return None;
        }
        let trimmed = line.trim_start();

        for section in MapSection::ALL {
            let Some(rest) = trimmed.strip_prefix(section.prefix()) else {
                continue;
            };
            let end = rest
                .find(|c: char| !is_symbol_char(c))
                .unwrap_or(rest.len());
            if end == 0 {
                return None;
            }
            return Some((section, &rest[..end], &rest[end..]));
        }

        None
    }
}

impl LinkerMapReader for GnuLdMapReader {
    fn entries(&self, map_text: &str) -> ToolchainResult<Vec<MapEntry>> {
        let mut lines = map_text.lines().enumerate();

        if !lines.any(|(_, line)| line.contains(MEMORY_MAP_HEADER)) {
            return Err(ToolchainError::MissingMemoryMap);
        }

        let mut entries = Vec::new();
        let mut pending: Option<(usize, MapSection, String)> = None;

        for (index, line) in lines {
            if let Some((_, section, symbol)) = pending.take() {
                match line.split_whitespace().next().and_then(parse_address) {
                    Some(load_address) => {
                        entries.push(MapEntry {
                            section,
                            symbol,
                            load_address,
                        });
                        continue;
                    }
                    None => {
                        warn!(
                            "No load address after section of '{}' (line {}), dropping it",
                            symbol,
                            index + 1
                        );
                    }
                }
            }

            let Some((section, symbol, rest)) = Self::section_line(line) else {
                continue;
            };

            // Short names keep the address on the same line
            match rest.split_whitespace().next().and_then(parse_address) {
                Some(load_address) => entries.push(MapEntry {
                    section,
                    symbol: symbol.to_string(),
                    load_address,
                }),
                None => pending = Some((index, section, symbol.to_string())),
            }
        }

        if let Some((index, _, symbol)) = pending {
            return Err(ToolchainError::malformed_map(
                index + 1,
                format!("map ends before the load address of '{}'", symbol),
            ));
        }

        debug!("Read {} linker map entries", entries.len());
        Ok(entries)
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_address(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
