//! Symbol linker.
//!
//! Registers exported entry points and import stubs with the host, and kicks
//! off decoding of the primary entry point.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::exports::ExportTable;
use crate::format::{STUB_PREFIX, STUB_SIZE};
use crate::host::{HostError, InstructionCache, MemoryImage, RegionFlags, SymbolRegistry};
use crate::resolve::ResolvedImports;
use crate::RelmodError;

/// An export registered with the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExportedSymbol {
    pub name: String,
    pub address: u32,
}

/// A stub synthesized for an external symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImportStub {
    pub name: String,
    pub address: u32,
}

/// Absolute address of an export. The low two bits of the offset are not
/// part of the address.
pub fn export_address(base: u32, offset: u32) -> u32 {
    base.wrapping_add(offset & !3)
}

/// Stub function and region name for `symbol`.
pub fn stub_name(symbol: &str) -> String {
    format!("{}{}", STUB_PREFIX, symbol)
}

/// Mark every export as an entry point and define a function there.
///
/// A function the host refuses to define is logged and left out of the
/// result; the entry point stays marked.
pub fn define_exports<H>(exports: &ExportTable, base: u32, host: &mut H) -> Vec<ExportedSymbol>
where
    H: SymbolRegistry + ?Sized,
{
    let mut defined = Vec::with_capacity(exports.len());
    for export in exports.iter() {
        let address = export_address(base, export.offset);
        host.add_entry_point(address);
        match host.define_function(address, &export.name) {
            Ok(()) => {
                log::debug!("[RELMOD Export] {} at {:#010x}", export.name, address);
                defined.push(ExportedSymbol {
                    name: export.name.clone(),
                    address,
                });
            }
            Err(e) => {
                log::warn!("[RELMOD Export] cannot define '{}': {}", export.name, e);
            }
        }
    }
    defined
}

/// Create one stub per resolved import target that no region backs yet.
///
/// A stub the host refuses to create is logged and skipped; the call sites
/// stay patched to the resolved address.
pub fn define_import_stubs<H>(resolved: &ResolvedImports, host: &mut H) -> Vec<ImportStub>
where
    H: MemoryImage + SymbolRegistry + ?Sized,
{
    let mut stubs = Vec::new();
    for (&address, symbol) in resolved.targets.iter() {
        if host.is_defined(address) {
            continue;
        }
        let name = stub_name(symbol);

        if let Err(e) = host.define_region(&name, address, &[0u8; STUB_SIZE], RegionFlags::CODE) {
            log::warn!("[RELMOD Link] cannot create stub '{}' at {:#010x}: {}", name, address, e);
            continue;
        }
        if let Err(e) = host.define_function(address, &name) {
            log::warn!("[RELMOD Link] cannot define stub function '{}': {}", name, e);
            continue;
        }

        log::debug!("[RELMOD Link] stub {} at {:#010x}", name, address);
        stubs.push(ImportStub { name, address });
    }
    stubs
}

/// Decode the module's primary entry point.
///
/// Returns `false` when the host had already decoded it, or when the region
/// there cannot be decoded.
pub fn disassemble_entry<H>(base: u32, host: &mut H) -> Result<bool, RelmodError>
where
    H: InstructionCache + ?Sized,
{
    match host.disassemble(base) {
        Ok(decoded) => Ok(decoded),
        Err(HostError::Unmapped(addr)) => Err(RelmodError::MemoryReadFailure { addr }),
        Err(HostError::CodeUnit(addr)) => Err(RelmodError::CodeUnitConflict { addr }),
        Err(e @ (HostError::Protected(_) | HostError::Overlap(_))) => {
            log::warn!("[RELMOD Link] entry point {:#010x} not decoded: {}", base, e);
            Ok(false)
        }
    }
}
