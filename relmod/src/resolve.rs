//! Import resolution engine.
//!
//! Every import reference is resolved through the external symbol map and
//! patched with the same rules as a relocation, using the resolved absolute
//! address in place of the load base.
//!
//! An import missing from the map aborts the whole pass: that site and every
//! site after it are left untouched, while earlier sites stay patched.

use alloc::string::String;

use crate::host::{InstructionCache, MemoryImage, SymbolLookup};
use crate::imports::ImportTable;
use crate::relocate::fixup;
use crate::table::OrderedTable;
use crate::RelmodError;

/// Outcome of the import pass.
#[derive(Debug, Clone, Default)]
pub struct ResolvedImports {
    /// Number of patched reference sites.
    pub applied: usize,
    /// Distinct resolved addresses, each with the first symbol that resolved to it.
    pub targets: OrderedTable<u32, String>,
}

/// Resolve and apply all import references for a module loaded at `base`.
pub fn apply_imports<H, S>(
    imports: &ImportTable,
    base: u32,
    symbols: &S,
    host: &mut H,
) -> Result<ResolvedImports, RelmodError>
where
    H: MemoryImage + InstructionCache + ?Sized,
    S: SymbolLookup + ?Sized,
{
    let mut resolved = ResolvedImports::default();

    for site in imports.iter() {
        let func_addr = symbols.lookup(&site.symbol).ok_or_else(|| {
            log::warn!("[RELMOD Import] '{}' is not in the symbol map", site.symbol);
            RelmodError::UnresolvedSymbol(site.symbol.clone())
        })?;

        let target = base.wrapping_add(site.address);
        fixup(host, target, site.kind, site.addend, func_addr)?;
        resolved.applied += 1;

        if !resolved.targets.contains_key(&func_addr) {
            resolved.targets.insert(func_addr, site.symbol.clone());
        }
    }

    log::debug!(
        "[RELMOD Import] applied {} import reference(s) to {} target(s)",
        resolved.applied,
        resolved.targets.len()
    );
    Ok(resolved)
}
