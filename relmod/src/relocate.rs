//! Relocation engine.
//!
//! Applies every internal relocation against the load base in table order.
//! The pass stops at the first failing site; sites already patched stay
//! patched.

use crate::host::{HostError, InstructionCache, MemoryImage};
use crate::patch;
use crate::reloc::{RelocKind, RelocationTable};
use crate::RelmodError;

/// Patch one site at absolute address `target`, using `base` as the base term.
///
/// Decoded-instruction state is stashed before the write and restored after
/// it, also when the read or write fails.
pub(crate) fn fixup<H>(
    host: &mut H,
    target: u32,
    kind: RelocKind,
    addend: u32,
    base: u32,
) -> Result<u32, RelmodError>
where
    H: MemoryImage + InstructionCache + ?Sized,
{
    host.stash(target)
        .map_err(|_| RelmodError::CodeUnitConflict { addr: target })?;

    let patched = patch_word(host, target, kind, addend, base);
    let restored = host.restore();

    // A failed patch is reported over a failed restore.
    let patched = patched?;
    restored.map_err(|_| RelmodError::CodeUnitConflict { addr: target })?;

    log::trace!(
        "[RELMOD Reloc] {} at {:#010x} -> {:#010x}",
        kind, target, patched
    );
    Ok(patched)
}

fn patch_word<H>(
    host: &mut H,
    target: u32,
    kind: RelocKind,
    addend: u32,
    base: u32,
) -> Result<u32, RelmodError>
where
    H: MemoryImage + ?Sized,
{
    let to = host
        .read_word(target)
        .map_err(|_| RelmodError::MemoryReadFailure { addr: target })?;
    let patched = patch::apply(kind, to, addend, base);
    host.write_word(target, patched).map_err(|e| match e {
        HostError::CodeUnit(addr) => RelmodError::CodeUnitConflict { addr },
        _ => RelmodError::MemoryWriteFailure { addr: target },
    })?;
    Ok(patched)
}

/// Apply all relocations for a module loaded at `base`.
///
/// Returns the number of patched sites.
pub fn apply_relocations<H>(
    relocations: &RelocationTable,
    base: u32,
    host: &mut H,
) -> Result<usize, RelmodError>
where
    H: MemoryImage + InstructionCache + ?Sized,
{
    let mut applied = 0;
    for entry in relocations.iter() {
        let target = base.wrapping_add(entry.address);
        fixup(host, target, entry.kind, entry.addend, base)?;
        applied += 1;
    }
    log::debug!("[RELMOD Reloc] applied {} relocation(s) at base {:#010x}", applied, base);
    Ok(applied)
}
