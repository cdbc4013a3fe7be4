//! MIPS field patch rules.
//!
//! Both fixup engines use the same rules: the relocation engine passes the
//! load base as `base`, the import engine passes the resolved symbol address.
//! All arithmetic is 32-bit with wraparound.

use crate::reloc::RelocKind;

const HI_MASK: u32 = 0xFFFF_0000;
const LO_MASK: u32 = 0x0000_FFFF;
const JUMP_OPCODE_MASK: u32 = 0xFC00_0000;
const JUMP_TARGET_MASK: u32 = 0x03FF_FFFF;

/// Compute the patched word for a fixup site currently holding `to`.
pub fn apply(kind: RelocKind, to: u32, addend: u32, base: u32) -> u32 {
    match kind {
        RelocKind::Word32 => to.wrapping_add(base),
        RelocKind::Hi16 => {
            let hi = addend.wrapping_add(base).wrapping_add(0x8000) >> 16;
            (to & HI_MASK) | (hi & LO_MASK)
        }
        // Only the immediate is rewritten; the upper half stays as read.
        RelocKind::Lo16 => (to & HI_MASK) | (to.wrapping_add(base) & LO_MASK),
        RelocKind::Jump26 => {
            let target = ((to & JUMP_TARGET_MASK) << 2).wrapping_add(base);
            (to & JUMP_OPCODE_MASK) | ((target >> 2) & JUMP_TARGET_MASK)
        }
    }
}
