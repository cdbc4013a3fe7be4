//! Load pipeline.
//!
//! A single linear pass over the module:
//!
//! ```text
//! ParseHeader -> CreateCodeRegion -> ParseTables -> ApplyRelocations
//!   -> ApplyImportFixups -> DefineExports -> DefineImportStubs -> Disassemble
//! ```
//!
//! The first failing phase ends the load. Nothing already written to the
//! host is undone.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::host::{InstructionCache, MemoryImage, RegionFlags, SymbolLookup, SymbolRegistry};
use crate::linker::{self, ExportedSymbol, ImportStub};
use crate::module::{ModuleTables, RelModule};
use crate::relocate::apply_relocations;
use crate::resolve::apply_imports;
use crate::{LoaderConfig, RelmodError};

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Phase {
    ParseHeader,
    CreateCodeRegion,
    ParseTables,
    ApplyRelocations,
    ApplyImportFixups,
    DefineExports,
    DefineImportStubs,
    Disassemble,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ParseHeader => "parse-header",
            Phase::CreateCodeRegion => "create-code-region",
            Phase::ParseTables => "parse-tables",
            Phase::ApplyRelocations => "apply-relocations",
            Phase::ApplyImportFixups => "apply-import-fixups",
            Phase::DefineExports => "define-exports",
            Phase::DefineImportStubs => "define-import-stubs",
            Phase::Disassemble => "disassemble",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Phase that failed.
    pub phase: Phase,
    /// What went wrong.
    pub error: RelmodError,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.phase, self.error)
    }
}

impl core::error::Error for LoadFailure {}

/// Summary of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoadReport {
    pub name: String,
    pub base: u32,
    pub code_size: usize,
    pub relocations_applied: usize,
    pub imports_applied: usize,
    pub exports: Vec<ExportedSymbol>,
    pub stubs: Vec<ImportStub>,
    /// Whether the entry point was decoded by this load.
    pub entry_decoded: bool,
}

/// Drives a module through the pipeline against a host.
pub struct Loader<'a, S: SymbolLookup + ?Sized> {
    config: LoaderConfig,
    symbols: &'a S,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, S: SymbolLookup + ?Sized> Loader<'a, S> {
    /// Create a loader resolving imports through `symbols`.
    pub fn new(config: LoaderConfig, symbols: &'a S) -> Self {
        Loader {
            config,
            symbols,
            cancel: None,
        }
    }

    /// Check `flag` before every phase and stop once it is set.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn enter(&self, phase: Phase) -> Result<(), LoadFailure> {
        if let Some(flag) = self.cancel {
            if flag.load(Ordering::Acquire) {
                return Err(LoadFailure {
                    phase,
                    error: RelmodError::Cancelled { phase },
                });
            }
        }
        log::debug!("[RELMOD Loader] entering {}", phase);
        Ok(())
    }

    /// Load `bytes` into `host` at the configured base.
    pub fn load<H>(&self, bytes: &[u8], host: &mut H) -> Result<LoadReport, LoadFailure>
    where
        H: MemoryImage + SymbolRegistry + InstructionCache + ?Sized,
    {
        let result = self.run(bytes, host);
        match &result {
            Ok(report) => log::info!(
                "[RELMOD Loader] loaded '{}' at {:#010x}: {} relocation(s), {} import site(s), {} export(s), {} stub(s)",
                report.name,
                report.base,
                report.relocations_applied,
                report.imports_applied,
                report.exports.len(),
                report.stubs.len()
            ),
            Err(failure) => log::warn!("[RELMOD Loader] load failed: {}", failure),
        }
        result
    }

    fn run<H>(&self, bytes: &[u8], host: &mut H) -> Result<LoadReport, LoadFailure>
    where
        H: MemoryImage + SymbolRegistry + InstructionCache + ?Sized,
    {
        let base = self.config.base;
        let fail = |phase: Phase| move |error: RelmodError| LoadFailure { phase, error };

        self.enter(Phase::ParseHeader)?;
        let (header, code) = RelModule::parse_header(bytes, self.config.max_name_len)
            .map_err(fail(Phase::ParseHeader))?;

        self.enter(Phase::CreateCodeRegion)?;
        host.define_region(&header.name, base, &code, RegionFlags::CODE)
            .map_err(|_| LoadFailure {
                phase: Phase::CreateCodeRegion,
                error: RelmodError::RegionConflict {
                    name: header.name.clone(),
                    addr: base,
                },
            })?;

        self.enter(Phase::ParseTables)?;
        let tables = ModuleTables::parse(bytes, &header, self.config.max_name_len)
            .map_err(fail(Phase::ParseTables))?;

        self.enter(Phase::ApplyRelocations)?;
        let relocations_applied = apply_relocations(&tables.relocations, base, host)
            .map_err(fail(Phase::ApplyRelocations))?;

        self.enter(Phase::ApplyImportFixups)?;
        let resolved = apply_imports(&tables.imports, base, self.symbols, host)
            .map_err(fail(Phase::ApplyImportFixups))?;

        self.enter(Phase::DefineExports)?;
        let exports = linker::define_exports(&tables.exports, base, host);

        self.enter(Phase::DefineImportStubs)?;
        let stubs = linker::define_import_stubs(&resolved, host);

        let mut entry_decoded = false;
        if self.config.disassemble_entry {
            self.enter(Phase::Disassemble)?;
            entry_decoded = linker::disassemble_entry(base, host)
                .map_err(fail(Phase::Disassemble))?;
        }

        Ok(LoadReport {
            name: header.name,
            base,
            code_size: code.len(),
            relocations_applied,
            imports_applied: resolved.applied,
            exports,
            stubs,
            entry_decoded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::host::HostError;
    use crate::image::ProgramImage;
    use crate::reloc::RelocKind;
    use alloc::collections::BTreeMap;

    fn os_funcs() -> BTreeMap<String, u32> {
        let mut map = BTreeMap::new();
        map.insert(String::from("printf"), 0x8004_1000);
        map.insert(String::from("exit"), 0x8004_2000);
        map
    }

    fn sample() -> Vec<u8> {
        ModuleBuilder::new("TRACK")
            .code_words(&[0x0C00_0010, 0x0000_0000, 0x0C00_0000, 0x0000_0000, 0x0000_0004])
            .relocation(0x0, RelocKind::Jump26, 0)
            .relocation(0x10, RelocKind::Word32, 0)
            .export("main", 0x0)
            .export("helper", 0x10)
            .import("printf", &[(0x8, RelocKind::Jump26, 0)])
            .build()
    }

    #[test]
    fn test_full_pipeline() {
        let symbols = os_funcs();
        let loader = Loader::new(LoaderConfig::default(), &symbols);
        let mut image = ProgramImage::new();

        let report = loader.load(&sample(), &mut image).unwrap();
        assert_eq!(report.name, "TRACK.sym");
        assert_eq!(report.code_size, 20);
        assert_eq!(report.relocations_applied, 2);
        assert_eq!(report.imports_applied, 1);
        assert_eq!(report.exports.len(), 2);
        assert_eq!(report.stubs.len(), 1);
        assert!(report.entry_decoded);

        let base = 0x8000_0000;
        assert!(image.region("TRACK.sym").is_some());
        // jal 0x40 relocated: field 0x10 + (0x80000000 >> 2), masked to 26 bits
        assert_eq!(image.read_word(base).unwrap(), 0x0C00_0010);
        assert_eq!(image.read_word(base + 8).unwrap(), 0x0C01_0400);
        assert_eq!(image.read_word(base + 0x10).unwrap(), 0x8000_0004);
        assert_eq!(image.function_at(base + 0x10), Some("helper"));
        assert_eq!(image.function_at(0x8004_1000), Some("IMP_printf"));
        assert!(image.decoded_at(base).is_some());
    }

    #[test]
    fn test_entry_skipped_when_disabled() {
        let symbols = os_funcs();
        let config = LoaderConfig {
            disassemble_entry: false,
            ..LoaderConfig::default()
        };
        let mut image = ProgramImage::new();
        let report = Loader::new(config, &symbols).load(&sample(), &mut image).unwrap();
        assert!(!report.entry_decoded);
        assert_eq!(image.decoded_count(), 0);
    }

    #[test]
    fn test_custom_base() {
        let symbols = os_funcs();
        let config = LoaderConfig {
            base: 0x8010_0000,
            ..LoaderConfig::default()
        };
        let mut image = ProgramImage::new();
        Loader::new(config, &symbols).load(&sample(), &mut image).unwrap();
        assert_eq!(image.read_word(0x8010_0010).unwrap(), 0x8010_0004);
        assert_eq!(image.function_at(0x8010_0000), Some("main"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let symbols = os_funcs();
        let flag = AtomicBool::new(true);
        let mut image = ProgramImage::new();
        let failure = Loader::new(LoaderConfig::default(), &symbols)
            .with_cancel(&flag)
            .load(&sample(), &mut image)
            .unwrap_err();
        assert_eq!(failure.phase, Phase::ParseHeader);
        assert_eq!(failure.error, RelmodError::Cancelled { phase: Phase::ParseHeader });
        assert!(image.regions().is_empty());
    }

    #[test]
    fn test_parse_failure_before_fixups() {
        let symbols = os_funcs();
        let mut bytes = sample();
        // Relocation offset far past the end of the stream.
        bytes[4..8].copy_from_slice(&0x1000u32.to_le_bytes());
        let mut image = ProgramImage::new();
        let failure = Loader::new(LoaderConfig::default(), &symbols)
            .load(&bytes, &mut image)
            .unwrap_err();
        assert_eq!(failure.phase, Phase::ParseHeader);
        assert!(matches!(failure.error, RelmodError::TruncatedStream { .. }));
        assert_eq!(image.write_count(), 0);
    }

    #[test]
    fn test_unresolved_import_fails_phase() {
        let symbols: BTreeMap<String, u32> = BTreeMap::new();
        let mut image = ProgramImage::new();
        let failure = Loader::new(LoaderConfig::default(), &symbols)
            .load(&sample(), &mut image)
            .unwrap_err();
        assert_eq!(failure.phase, Phase::ApplyImportFixups);
        assert_eq!(failure.error, RelmodError::UnresolvedSymbol(String::from("printf")));
        // Relocations ran before the failure and stay applied.
        assert_eq!(image.read_word(0x8000_0010).unwrap(), 0x8000_0004);
        assert!(image.functions().is_empty());
    }

    #[test]
    fn test_region_conflict() {
        let symbols = os_funcs();
        let mut image = ProgramImage::new();
        image.define_region("RAM", 0x8000_0000, &[0u8; 4], RegionFlags::CODE).unwrap();
        let failure = Loader::new(LoaderConfig::default(), &symbols)
            .load(&sample(), &mut image)
            .unwrap_err();
        assert_eq!(failure.phase, Phase::CreateCodeRegion);
    }

    /// Host that raises the cancel flag once a word has been written.
    struct CancelOnWrite<'a> {
        image: ProgramImage,
        flag: &'a AtomicBool,
    }

    impl MemoryImage for CancelOnWrite<'_> {
        fn read_word(&self, addr: u32) -> Result<u32, HostError> {
            self.image.read_word(addr)
        }

        fn write_word(&mut self, addr: u32, value: u32) -> Result<(), HostError> {
            self.image.write_word(addr, value)?;
            self.flag.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn define_region(
            &mut self,
            name: &str,
            addr: u32,
            bytes: &[u8],
            flags: RegionFlags,
        ) -> Result<(), HostError> {
            self.image.define_region(name, addr, bytes, flags)
        }

        fn is_defined(&self, addr: u32) -> bool {
            self.image.is_defined(addr)
        }
    }

    impl SymbolRegistry for CancelOnWrite<'_> {
        fn define_function(&mut self, addr: u32, name: &str) -> Result<(), HostError> {
            self.image.define_function(addr, name)
        }

        fn add_entry_point(&mut self, addr: u32) {
            self.image.add_entry_point(addr)
        }
    }

    impl InstructionCache for CancelOnWrite<'_> {
        fn stash(&mut self, addr: u32) -> Result<(), HostError> {
            self.image.stash(addr)
        }

        fn restore(&mut self) -> Result<(), HostError> {
            self.image.restore()
        }

        fn disassemble(&mut self, addr: u32) -> Result<bool, HostError> {
            self.image.disassemble(addr)
        }
    }

    #[test]
    fn test_cancelled_between_phases() {
        let symbols = os_funcs();
        let flag = AtomicBool::new(false);
        let mut host = CancelOnWrite {
            image: ProgramImage::new(),
            flag: &flag,
        };
        let failure = Loader::new(LoaderConfig::default(), &symbols)
            .with_cancel(&flag)
            .load(&sample(), &mut host)
            .unwrap_err();

        assert_eq!(failure.phase, Phase::ApplyImportFixups);
        assert_eq!(failure.error, RelmodError::Cancelled { phase: Phase::ApplyImportFixups });
        // The whole relocation pass ran; no import site was touched.
        assert_eq!(host.image.write_count(), 2);
        assert_eq!(host.read_word(0x8000_0010).unwrap(), 0x8000_0004);
        assert_eq!(host.read_word(0x8000_0008).unwrap(), 0x0C00_0000);
        assert!(host.image.functions().is_empty());
    }

    #[test]
    fn test_overlapping_stub_does_not_fail_load() {
        let mut symbols = BTreeMap::new();
        symbols.insert(String::from("a"), 0x8004_1001);
        symbols.insert(String::from("b"), 0x8004_1000);
        let bytes = ModuleBuilder::new("TRACK")
            .code_words(&[0, 0])
            .import("a", &[(0x0, RelocKind::Word32, 0)])
            .import("b", &[(0x4, RelocKind::Word32, 0)])
            .build();
        let mut image = ProgramImage::new();

        let report = Loader::new(LoaderConfig::default(), &symbols)
            .load(&bytes, &mut image)
            .unwrap();
        assert_eq!(report.imports_applied, 2);
        assert_eq!(report.stubs.len(), 1);
        assert_eq!(report.stubs[0].name, "IMP_a");
        assert_eq!(image.read_word(0x8000_0004).unwrap(), 0x8004_1000);
        assert!(report.entry_decoded);
    }
}
