//! Import table parser.
//!
//! Layout: a u32 group count, then per group a NUL-terminated symbol name,
//! padding up to the next 4-byte boundary, a u32 reference count and the
//! reference words (encoded like relocations).
//!
//! References from all groups share one address-keyed table; a later
//! reference to the same address replaces an earlier one, even across groups.

use alloc::string::String;
use alloc::vec::Vec;

use crate::format::{IMPORT_ALIGN, IMPORT_NAME_TERMINATOR};
use crate::reader::BinaryReader;
use crate::reloc::{RelocKind, RelocationEntry};
use crate::table::OrderedTable;
use crate::RelmodError;

/// A reference site bound to an external symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImportRef {
    /// Word-aligned offset of the patch site within the code segment.
    pub address: u32,
    /// Fixup kind.
    pub kind: RelocKind,
    /// Imported symbol name.
    pub symbol: String,
    /// Paired addend for `Hi16`, zero otherwise.
    pub addend: u32,
}

/// All reference sites of one imported symbol, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImportEntry {
    /// Imported symbol name.
    pub symbol: String,
    /// Reference fixups as they appear in the stream.
    pub refs: Vec<RelocationEntry>,
}

/// Parsed import table.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    groups: OrderedTable<String, ImportEntry>,
    refs: OrderedTable<u32, ImportRef>,
}

impl ImportTable {
    /// Parse the import table at `offset`.
    pub fn parse(
        reader: &mut BinaryReader<'_>,
        offset: usize,
        max_name_len: usize,
    ) -> Result<Self, RelmodError> {
        reader.seek(offset);
        let total_count = reader.read_u32_le()?;
        let mut table = ImportTable::default();

        for _ in 0..total_count {
            let symbol = reader.read_terminated(&[IMPORT_NAME_TERMINATOR], max_name_len)?;
            reader.align_to(IMPORT_ALIGN);

            let refs_count = reader.read_u32_le()?;
            let mut refs = Vec::new();

            for _ in 0..refs_count {
                let word = reader.read_u32_le()?;
                let entry = RelocationEntry::decode(word, reader)?;
                table.refs.insert(
                    entry.address,
                    ImportRef {
                        address: entry.address,
                        kind: entry.kind,
                        symbol: symbol.clone(),
                        addend: entry.addend,
                    },
                );
                refs.push(entry);
            }

            log::trace!("[RELMOD Import] '{}': {} reference(s)", symbol, refs.len());
            table.add_group(symbol, refs);
        }

        log::debug!(
            "[RELMOD Import] parsed {} symbol(s), {} reference site(s)",
            table.groups.len(),
            table.refs.len()
        );
        Ok(table)
    }

    fn add_group(&mut self, symbol: String, refs: Vec<RelocationEntry>) {
        let mut merged = match self.groups.get(&symbol) {
            Some(existing) => existing.refs.clone(),
            None => Vec::new(),
        };
        merged.extend(refs);
        self.groups.insert(
            symbol.clone(),
            ImportEntry {
                symbol,
                refs: merged,
            },
        );
    }

    /// Number of distinct reference sites.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether the table has no reference sites.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Reference bound to a patch address.
    pub fn get(&self, address: u32) -> Option<&ImportRef> {
        self.refs.get(&address)
    }

    /// Iterate reference sites in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ImportRef> {
        self.refs.values()
    }

    /// Iterate imported symbols in table order.
    pub fn symbols(&self) -> impl Iterator<Item = &ImportEntry> {
        self.groups.values()
    }
}
