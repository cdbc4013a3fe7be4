//! RELMOD container layout constants and format detection.

use crate::reader::BinaryReader;

/// Format tag: the low half of the first header word.
///
/// The code segment always starts right after the five-word header, so the
/// first offset is `0x14` in every module the packer emits.
pub const TAG: u16 = 0x0014;

/// Size of the fixed header (five u32 offsets).
pub const HEADER_SIZE: usize = 5 * 4;

/// Default load address (KSEG0).
pub const DEFAULT_BASE: u32 = 0x8000_0000;

/// Processor description for hosts that key on a language id.
pub const PROCESSOR: &str = "MIPS:LE:32:default";

/// Terminates the relocation table.
pub const RELOC_SENTINEL: u32 = 0xFFFF_FFFF;

/// Terminates the module name and export names.
pub const NAME_DELIMITER: u8 = 0x2A;

/// Terminates import names.
pub const IMPORT_NAME_TERMINATOR: u8 = 0x00;

/// Import groups re-align the cursor to this boundary after their name.
pub const IMPORT_ALIGN: usize = 4;

/// Mask selecting the fixup kind from a reference word.
pub const KIND_MASK: u32 = 0x3;

/// Mask selecting the word-aligned fixup address from a reference word.
pub const ADDRESS_MASK: u32 = 0xFFFF_FFFC;

/// Name prefix of synthesized import stubs.
pub const STUB_PREFIX: &str = "IMP_";

/// Size of a synthesized import stub region.
pub const STUB_SIZE: usize = 4;

/// Result of probing a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoadSpec {
    /// Tag read from offset 0.
    pub tag: u16,
    /// Suggested load address.
    pub base: u32,
    /// Processor description.
    pub processor: &'static str,
}

/// Check whether `data` looks like a RELMOD module.
///
/// Returns `None` when the stream is shorter than a header or carries a
/// different tag.
pub fn probe(data: &[u8]) -> Option<LoadSpec> {
    if data.len() < HEADER_SIZE {
        return None;
    }
    let tag = BinaryReader::new(data).read_u16_le().ok()?;
    if tag != TAG {
        return None;
    }
    Some(LoadSpec {
        tag,
        base: DEFAULT_BASE,
        processor: PROCESSOR,
    })
}
