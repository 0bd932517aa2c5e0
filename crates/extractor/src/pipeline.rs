//! Extraction pipeline
//!
//! Runs the eight passes in order over one module tree. Each pass only
//! reads what earlier passes wrote:
//!
//! 1. classify symbols against the discovered module paths
//! 2. build the module tree
//! 3. attach callables and data symbols from relocation records
//! 4. decode literal payloads
//! 5. resolve addresses from the linker map
//! 6. lay out procedure arguments in the shared overlay
//! 7. copy ancestor callables into inputs
//! 8. serialize

use fwmeta_core::{Config, Diagnostic, Error, Pass, Result};
use fwmeta_toolchain::{MapEntry, ToolchainIntrospector};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::address::{AddressResolver, SymbolAddressTable};
use crate::arguments::resolve_arguments;
use crate::checksum::FirmwareChecksum;
use crate::classify::{discover_module, ClassifiedSymbol, SymbolClassifier, SymbolRole};
use crate::demangle::Demangler;
use crate::descriptive::extract_payloads;
use crate::inheritance::inherit_callables;
use crate::model::ModulePath;
use crate::output::{serialize_tree, ModelDocument};
use crate::relocation::resolve_relocations;
use crate::tree::ModuleTree;

/// Counts gathered over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStatistics {
    pub symbols: usize,
    pub modules: usize,
    pub inputs: usize,
    pub procedures: usize,
    pub arguments: usize,
    pub relocations_applied: usize,
    pub payloads_decoded: usize,
    pub callables_resolved: usize,
    pub callables_unexported: usize,
    pub callables_inherited: usize,
    pub noop_discarded: usize,
    pub data_resolved: usize,
    pub data_unexported: usize,
    pub diagnostics: usize,
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: ModelDocument,
    pub statistics: ExtractionStatistics,
    /// Per-symbol failures, in the order they happened
    pub diagnostics: Vec<Diagnostic>,
}

/// Reconstructs the model of one firmware build
pub struct ModelExtractor {
    toolchain: Box<dyn ToolchainIntrospector>,
    map_entries: Vec<MapEntry>,
    config: Config,
}

impl ModelExtractor {
    pub fn new(
        toolchain: Box<dyn ToolchainIntrospector>,
        map_entries: Vec<MapEntry>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            toolchain,
            map_entries,
            config,
        })
    }

    /// Create an extractor from a toolchain snapshot and a GNU ld map file
    pub fn from_files(snapshot_path: &Path, map_path: &Path, config: Config) -> Result<Self> {
        info!("Loading toolchain snapshot from {:?}", snapshot_path);
        let snapshot = fwmeta_toolchain::load_snapshot(snapshot_path)
            .map_err(|e| Error::toolchain(e.to_string()))?;

        info!("Loading linker map from {:?}", map_path);
        let map_entries = fwmeta_toolchain::read_map_file(map_path)
            .map_err(|e| Error::toolchain(e.to_string()))?;

        Self::new(Box::new(snapshot), map_entries, config)
    }

    /// Run every pass; fatal errors abort before a document is produced
    pub fn run(&self) -> Result<Extraction> {
        info!("Starting model extraction");
        let toolchain = self.toolchain.as_ref();
        let mut demangler = Demangler::new(toolchain);
        let mut diagnostics = Vec::new();
        let mut statistics = ExtractionStatistics::default();

        begin(Pass::Classify);
        let (paths, classified) = self.classify(&mut demangler, &mut diagnostics, &mut statistics)?;

        begin(Pass::BuildTree);
        let mut tree = ModuleTree::new();
        for path in &paths {
            tree.get_or_create(path);
        }
        for symbol in &classified {
            tree.target_mut(&symbol.role);
        }
        info!("Module tree has {} modules", tree.len());

        begin(Pass::Relocations);
        let records = toolchain
            .relocations()
            .map_err(|e| Error::toolchain(e.to_string()))?;
        statistics.relocations_applied = resolve_relocations(
            &mut tree,
            &classified,
            &records,
            &self.config.sections,
            &mut demangler,
        )?;
        info!(
            "Applied {} of {} relocation records",
            statistics.relocations_applied,
            records.len()
        );

        begin(Pass::Payloads);
        statistics.payloads_decoded = extract_payloads(
            &mut tree,
            &classified,
            toolchain,
            &self.config.target,
            &self.config.sections,
            self.config.parallel_payloads,
            &mut diagnostics,
        )?;
        info!("Decoded {} literal payloads", statistics.payloads_decoded);

        begin(Pass::MapAddresses);
        let table = SymbolAddressTable::build(&self.map_entries, &mut demangler)?;
        let mut resolver = AddressResolver::new(&table, &self.config.target);
        resolver.resolve_tree(&mut tree);
        let counts = resolver.counts();
        statistics.callables_resolved = counts.callables_resolved;
        statistics.callables_unexported = counts.callables_unexported;
        statistics.noop_discarded = counts.noop_discarded;
        statistics.data_resolved = counts.data_resolved;
        statistics.data_unexported = counts.data_unexported;
        info!(
            "Resolved {} callables and {} data entities, {} unexported",
            counts.callables_resolved,
            counts.data_resolved,
            counts.callables_unexported + counts.data_unexported
        );

        begin(Pass::ArgumentLayout);
        let placed = resolve_arguments(&mut tree, &table, &self.config.target)?;
        info!("Placed {} procedure arguments", placed);

        begin(Pass::Inheritance);
        statistics.callables_inherited = inherit_callables(&mut tree);
        info!("{} inputs inherit a callable", statistics.callables_inherited);

        begin(Pass::Serialize);
        let checksum = toolchain
            .object_image()
            .map_err(|e| Error::toolchain(e.to_string()))?
            .map(|image| FirmwareChecksum::compute(&image));
        match checksum {
            Some(checksum) => info!("Firmware checksum {}", checksum),
            None => debug!("No object image, document carries no checksum"),
        }
        let document = serialize_tree(&tree, checksum.map(|c| c.to_hex()));

        count_entities(&tree, &mut statistics);
        statistics.diagnostics = diagnostics.len();

        info!(
            "Extraction complete: {} modules, {} inputs, {} procedures, {} diagnostics",
            statistics.modules, statistics.inputs, statistics.procedures, statistics.diagnostics
        );

        Ok(Extraction {
            document,
            statistics,
            diagnostics,
        })
    }

    /// Pass 1: discover module paths, then classify every symbol against them
    fn classify(
        &self,
        demangler: &mut Demangler<'_>,
        diagnostics: &mut Vec<Diagnostic>,
        statistics: &mut ExtractionStatistics,
    ) -> Result<(IndexSet<ModulePath>, Vec<ClassifiedSymbol>)> {
        let markers = &self.config.markers;

        let symbols: IndexSet<String> = self
            .toolchain
            .symbols()
            .map_err(|e| Error::toolchain(e.to_string()))?
            .into_iter()
            .collect();
        if symbols.is_empty() {
            return Err(Error::toolchain("object has no symbols"));
        }
        statistics.symbols = symbols.len();

        let mut names = Vec::with_capacity(symbols.len());
        for mangled in &symbols {
            names.push(demangler.symbol(mangled)?);
        }

        let paths: IndexSet<ModulePath> = names
            .iter()
            .filter_map(|name| discover_module(markers, &name.unmangled))
            .collect();
        info!("Discovered {} modules", paths.len());

        let classifier = SymbolClassifier::new(markers, paths.iter().cloned());
        let mut classified = Vec::new();
        for name in names {
            match classifier.classify(&name.mangled, &name.unmangled) {
                Ok(SymbolRole::Irrelevant) | Ok(SymbolRole::ModuleMarker(_)) => {}
                Ok(role) => classified.push(ClassifiedSymbol { name, role }),
                Err(e) if !e.is_fatal() => {
                    warn!("{}", e);
                    diagnostics.push(Diagnostic::new(Pass::Classify, &name.mangled, &e));
                }
                Err(e) => return Err(e),
            }
        }
        info!("Classified {} metadata symbols", classified.len());

        Ok((paths, classified))
    }
}

fn begin(pass: Pass) {
    info!("Pass {}/{}: {}", pass as usize + 1, Pass::ALL.len(), pass);
}

fn count_entities(tree: &ModuleTree, statistics: &mut ExtractionStatistics) {
    statistics.modules = tree.len();
    for id in tree.preorder() {
        let module = tree.module(id);
        statistics.inputs += module.inputs.len();
        statistics.procedures += module.procedures.len();
        statistics.arguments += module
            .procedures
            .values()
            .map(|p| p.arguments.len())
            .sum::<usize>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwmeta_core::{PrimitiveType, ResolvedAddress, SectionKind};
    use fwmeta_toolchain::{ArtifactSnapshot, GnuLdMapReader, LinkerMapReader};

    const NS: &str = "kaleidoscope::module::";
    const ARGS_MANGLED: &str = "_ZN12kaleidoscope6module31_______procedure_args_union_______E";
    const NOOP_MANGLED: &str = "_ZN12kaleidoscope6module16_______noUpdate_______Ev";

    const MAP: &str = "\
Linker script and memory map

 .text._ZN3FooC
                0x0000000000900010       0x20 sketch.o
 .text._ZN3Foo5resetEv
                0x0000000000000400       0x10 sketch.o
 .data._ZN3Foo3objE
                0x0000000000800100        0x8 sketch.o
 .bss._ZN12kaleidoscope6module31_______procedure_args_union_______E
                0x0000000000800200        0x4 sketch.o
 .text._ZN12kaleidoscope6module16_______noUpdate_______Ev
                0x0000000000000500        0x2 sketch.o
";

    fn meta(mangled: &str, tail: &str) -> (String, String) {
        (mangled.to_string(), format!("{}{}", NS, tail))
    }

    fn level_field(field: &str) -> String {
        format!(
            "Foo::_______procedure_______::reset::_______arguments_______::level::{}::{}",
            "_______info_______", field
        )
    }

    fn snapshot() -> ArtifactSnapshot {
        let config = Config::default();
        let symbols = [
            meta("_Zfoo_mod", "Foo::_______module_______"),
            meta("_Zfoo_desc", "Foo::_______info_______::description"),
            meta("_Zfoo_cb", "Foo::_______info_______::callable"),
            meta("_Zbar_desc", "Foo::_______inputs_______::bar::_______info_______::description"),
            meta("_Zbar_size", "Foo::_______inputs_______::bar::_______info_______::size"),
            meta("_Zbar_type", "Foo::_______inputs_______::bar::_______info_______::type"),
            meta("_Zbar_addr", "Foo::_______inputs_______::bar::_______info_______::address"),
            meta("_Zreset_cb", "Foo::_______procedure_______::reset::_______info_______::callable"),
            meta("_Zlevel_off", &level_field("offset")),
            meta("_Zlevel_type", &level_field("type")),
            meta("_Zbarmod_mod", "Bar::_______module_______"),
            meta("_Zbarmod_cb", "Bar::_______info_______::callable"),
            meta("_Zx_size", "Bar::_______inputs_______::x::_______info_______::size"),
            ("main".to_string(), "main".to_string()),
        ];

        let mut snapshot = ArtifactSnapshot::new();
        for (mangled, demangled) in symbols {
            snapshot = snapshot.with_symbol(mangled, demangled);
        }

        snapshot
            .with_demangled("_ZN3FooC", "Foo::update()")
            .with_demangled("_ZN3Foo5resetEv", "Foo::reset()")
            .with_demangled("_ZN3Foo3objE", "Foo::obj")
            .with_demangled(ARGS_MANGLED, config.target.args_base_symbol.clone())
            .with_demangled(NOOP_MANGLED, config.target.noop_callable.clone())
            .with_payload(SectionKind::ReadOnly, "_Zfoo_desc", b"A test module\0")
            .with_payload(SectionKind::ReadOnly, "_Zbar_desc", b"Brightness\0")
            .with_payload(SectionKind::ReadOnly, "_Zbar_size", &[0x10, 0x01])
            .with_payload(SectionKind::ReadOnly, "_Zbar_type", &[1])
            .with_payload(SectionKind::ReadOnly, "_Zlevel_off", &[2])
            .with_payload(SectionKind::Initialized, "_Zlevel_type", &[0])
            .with_payload(SectionKind::ReadOnly, "_Zx_size", &[1, 0])
            .with_relocation(".rodata._Zfoo_cb", "00000000 R_AVR_16_PM .text._ZN3FooC")
            .with_relocation(".rodata._Zbar_addr", "00000000 R_AVR_16 .data._ZN3Foo3objE+0x4")
            .with_relocation(".rodata._Zreset_cb", "00000000 R_AVR_16_PM .text._ZN3Foo5resetEv")
            .with_relocation(
                ".rodata._Zbarmod_cb",
                format!("00000000 R_AVR_16_PM .text.{}", NOOP_MANGLED),
            )
            .with_relocation(".rela.text.main", "00000002 R_AVR_CALL .text._ZN3FooC")
    }

    fn extractor(snapshot: ArtifactSnapshot, map: &str) -> ModelExtractor {
        let entries = GnuLdMapReader::new().entries(map).unwrap();
        ModelExtractor::new(Box::new(snapshot), entries, Config::default()).unwrap()
    }

    #[test]
    fn test_full_extraction() {
        let extraction = extractor(snapshot(), MAP).run().unwrap();
        assert!(extraction.diagnostics.is_empty());

        let document = &extraction.document;
        let names: Vec<&str> = document.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Foo", "Bar"]);

        let foo = document.find_module("Foo").unwrap();
        assert_eq!(foo.description, "A test module");
        let own = foo.callable.as_ref().unwrap();
        assert_eq!(own.address, Some(ResolvedAddress::Address(0x0090_0010 / 2)));
        assert!(!own.inherited);

        let bar = document.find_input("Foo::bar").unwrap();
        assert_eq!(bar.description, "Brightness");
        assert_eq!(bar.data.size, 272);
        assert_eq!(bar.data.primitive, Some(PrimitiveType::U16));
        assert_eq!(bar.data.offset, 4);
        assert_eq!(bar.data.base_address, Some(ResolvedAddress::Address(0x100)));
        assert_eq!(bar.data.address, Some(ResolvedAddress::Address(0x104)));

        let inherited = bar.callable.as_ref().unwrap();
        assert_eq!(inherited.address, Some(ResolvedAddress::Address(0x0090_0010 / 2)));
        assert_eq!(inherited.symbol_mangled, "_ZN3FooC");
        assert!(inherited.inherited);

        let reset = document.find_procedure("Foo::reset").unwrap();
        assert_eq!(
            reset.callable.as_ref().unwrap().address,
            Some(ResolvedAddress::Address(0x200))
        );
        let level = &reset.arguments[0].data;
        assert_eq!(level.primitive, Some(PrimitiveType::U8));
        assert_eq!(level.base_address, Some(ResolvedAddress::Address(0x200)));
        assert_eq!(level.address, Some(ResolvedAddress::Address(0x202)));
    }

    #[test]
    fn test_noop_callable_never_emitted() {
        let extraction = extractor(snapshot(), MAP).run().unwrap();

        let bar_module = extraction.document.find_module("Bar").unwrap();
        assert!(bar_module.callable.is_none());
        let x = extraction.document.find_input("Bar::x").unwrap();
        assert!(x.callable.is_none());
        assert_eq!(x.data.address, Some(ResolvedAddress::Unexported));

        let json = extraction.document.to_json_pretty().unwrap();
        assert!(!json.contains("_______noUpdate_______"));
        assert_eq!(extraction.statistics.noop_discarded, 1);
    }

    #[test]
    fn test_noop_callable_opts_out_of_inheritance() {
        let noop_target = format!("00000000 R_AVR_16_PM .text.{}", NOOP_MANGLED);
        let snapshot = snapshot()
            .with_symbol(
                "_Zquiet_cb",
                format!("{}Foo::_______inputs_______::quiet::_______info_______::callable", NS),
            )
            .with_symbol("_Zmuted_mod", format!("{}Foo::Muted::_______module_______", NS))
            .with_symbol("_Zmuted_cb", format!("{}Foo::Muted::_______info_______::callable", NS))
            .with_symbol(
                "_Zz_size",
                format!("{}Foo::Muted::_______inputs_______::z::_______info_______::size", NS),
            )
            .with_payload(SectionKind::ReadOnly, "_Zz_size", &[1, 0])
            .with_relocation(".rodata._Zquiet_cb", noop_target.clone())
            .with_relocation(".rodata._Zmuted_cb", noop_target);

        let extraction = extractor(snapshot, MAP).run().unwrap();
        let document = &extraction.document;

        assert!(document.find_input("Foo::quiet").unwrap().callable.is_none());
        assert!(document.find_module("Foo::Muted").unwrap().callable.is_none());
        assert!(document.find_input("Foo::Muted::z").unwrap().callable.is_none());

        let bar = document.find_input("Foo::bar").unwrap();
        assert_eq!(bar.callable.as_ref().unwrap().symbol_mangled, "_ZN3FooC");
        assert_eq!(extraction.statistics.noop_discarded, 3);
        assert_eq!(extraction.statistics.callables_inherited, 1);
    }

    #[test]
    fn test_statistics() {
        let statistics = extractor(snapshot(), MAP).run().unwrap().statistics;
        assert_eq!(statistics.modules, 2);
        assert_eq!(statistics.inputs, 2);
        assert_eq!(statistics.procedures, 1);
        assert_eq!(statistics.arguments, 1);
        assert_eq!(statistics.relocations_applied, 4);
        assert_eq!(statistics.payloads_decoded, 7);
        assert_eq!(statistics.callables_inherited, 1);
        assert_eq!(statistics.diagnostics, 0);
    }

    #[test]
    fn test_runs_are_identical() {
        let extractor = extractor(snapshot().with_object_image(b"\x7fELF"), MAP);
        let first = extractor.run().unwrap().document;
        let second = extractor.run().unwrap().document;

        assert!(first.checksum.is_some());
        assert_eq!(first, second);
        assert_eq!(first.to_yaml().unwrap(), second.to_yaml().unwrap());
    }

    #[test]
    fn test_parallel_payloads_match() {
        let sequential = extractor(snapshot(), MAP).run().unwrap().document;

        let mut config = Config::default();
        config.parallel_payloads = true;
        let entries = GnuLdMapReader::new().entries(MAP).unwrap();
        let parallel = ModelExtractor::new(Box::new(snapshot()), entries, config)
            .unwrap()
            .run()
            .unwrap()
            .document;

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_per_symbol_errors_do_not_abort() {
        let snapshot = snapshot()
            .with_symbol(
                "_Zbar_color",
                format!("{}Foo::_______inputs_______::bar::_______info_______::color", NS),
            )
            .with_symbol(
                "_Zreset_desc",
                format!(
                    "{}Foo::_______procedure_______::reset::_______info_______::description",
                    NS
                ),
            );

        let extraction = extractor(snapshot, MAP).run().unwrap();
        assert_eq!(extraction.diagnostics.len(), 2);
        assert_eq!(extraction.diagnostics[0].pass, Pass::Classify);
        assert_eq!(extraction.diagnostics[0].symbol, "_Zbar_color");
        assert_eq!(extraction.diagnostics[1].pass, Pass::Payloads);
        assert_eq!(extraction.diagnostics[1].symbol, "_Zreset_desc");

        let bar = extraction.document.find_input("Foo::bar").unwrap();
        assert_eq!(bar.data.size, 272);
        assert_eq!(extraction.document.find_procedure("Foo::reset").unwrap().description, "");
    }

    #[test]
    fn test_missing_argument_overlay_is_fatal() {
        let overlay = format!(
            " .bss.{}\n                0x0000000000800200        0x4 sketch.o\n",
            ARGS_MANGLED
        );
        let map = MAP.replace(&overlay, "");
        assert_ne!(map, MAP);
        let err = extractor(snapshot(), &map).run().unwrap_err();
        assert!(matches!(err, Error::MapResolution(_)));
    }

    #[test]
    fn test_empty_symbol_table_is_fatal() {
        let err = extractor(ArtifactSnapshot::new(), MAP).run().unwrap_err();
        assert!(matches!(err, Error::Toolchain(_)));
    }

    #[test]
    fn test_every_declared_module_is_emitted() {
        let mut snapshot = ArtifactSnapshot::new();
        for name in ["Alpha", "Beta", "Gamma", "Delta"] {
            snapshot = snapshot.with_symbol(
                format!("_Z{}", name),
                format!("{}{}::_______module_______", NS, name),
            );
        }
        snapshot = snapshot.with_symbol(
            "_ZInner",
            format!("{}Beta::Inner::_______module_______", NS),
        );

        let document = extractor(snapshot, MAP).run().unwrap().document;
        let names: Vec<&str> = document.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Delta"]);
        assert_eq!(document.find_module("Beta::Inner").unwrap().name, "Inner");
    }
}
