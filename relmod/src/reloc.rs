//! Relocation table parser.
//!
//! The table is a run of reference words terminated by `0xFFFFFFFF`. Each
//! word packs a word-aligned code offset with a two-bit fixup kind in its low
//! bits; a hi16 fixup is followed by one addend word.

use core::fmt;

use crate::format::{ADDRESS_MASK, KIND_MASK, RELOC_SENTINEL};
use crate::reader::BinaryReader;
use crate::table::OrderedTable;
use crate::RelmodError;

/// Fixup kind, taken from the low two bits of a reference word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum RelocKind {
    /// Absolute 32-bit word.
    Word32 = 0,
    /// Upper half of a hi16/lo16 pair, computed from a paired addend.
    Hi16 = 1,
    /// Lower 16-bit immediate.
    Lo16 = 2,
    /// 26-bit `j`/`jal` target field.
    Jump26 = 3,
}

impl RelocKind {
    /// Decode from the low two bits of a reference word.
    pub fn from_bits(word: u32) -> Self {
        match word & KIND_MASK {
            0 => RelocKind::Word32,
            1 => RelocKind::Hi16,
            2 => RelocKind::Lo16,
            _ => RelocKind::Jump26,
        }
    }

    /// Raw two-bit encoding.
    pub fn bits(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for RelocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocKind::Word32 => write!(f, "word32"),
            RelocKind::Hi16 => write!(f, "hi16"),
            RelocKind::Lo16 => write!(f, "lo16"),
            RelocKind::Jump26 => write!(f, "jump26"),
        }
    }
}

/// A single decoded fixup site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RelocationEntry {
    /// Word-aligned offset of the patch site within the code segment.
    pub address: u32,
    /// Fixup kind.
    pub kind: RelocKind,
    /// Paired addend for `Hi16`, zero otherwise.
    pub addend: u32,
}

impl RelocationEntry {
    /// Decode a reference word, reading the addend that follows a `Hi16`.
    pub fn decode(word: u32, reader: &mut BinaryReader<'_>) -> Result<Self, RelmodError> {
        let kind = RelocKind::from_bits(word);
        let addend = match kind {
            RelocKind::Hi16 => reader.read_u32_le()?,
            _ => 0,
        };
        Ok(RelocationEntry {
            address: word & ADDRESS_MASK,
            kind,
            addend,
        })
    }
}

/// Internal relocations keyed by patch address.
#[derive(Debug, Clone, Default)]
pub struct RelocationTable {
    entries: OrderedTable<u32, RelocationEntry>,
}

impl RelocationTable {
    /// Parse the sentinel-terminated table at `offset`.
    pub fn parse(reader: &mut BinaryReader<'_>, offset: usize) -> Result<Self, RelmodError> {
        reader.seek(offset);
        let mut entries = OrderedTable::new();

        loop {
            let word = reader.read_u32_le()?;
            if word == RELOC_SENTINEL {
                break;
            }
            let entry = RelocationEntry::decode(word, reader)?;
            if entries.insert(entry.address, entry).is_some() {
                log::trace!("[RELMOD Reloc] duplicate relocation at {:#x}, keeping later entry", entry.address);
            }
        }

        log::debug!("[RELMOD Reloc] parsed {} relocation(s)", entries.len());
        Ok(RelocationTable { entries })
    }

    /// Number of distinct patch sites.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a patch address.
    pub fn get(&self, address: u32) -> Option<&RelocationEntry> {
        self.entries.get(&address)
    }

    /// Iterate entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &RelocationEntry> {
        self.entries.values()
    }
}
