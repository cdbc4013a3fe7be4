//! Export table parser.
//!
//! Layout: a u32 count followed by `count` pairs of `(name_offset,
//! func_offset)`. Name offsets are relative to the start of the table.

use alloc::string::String;

use crate::format::NAME_DELIMITER;
use crate::reader::BinaryReader;
use crate::table::OrderedTable;
use crate::RelmodError;

/// Export names end at the `*` delimiter; the packer writes NUL instead, so
/// both terminate a name.
const EXPORT_NAME_TERMINATORS: [u8; 2] = [NAME_DELIMITER, 0x00];

/// A named entry point defined by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExportEntry {
    /// Function name.
    pub name: String,
    /// Offset from the load base.
    pub offset: u32,
}

/// Exports keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    entries: OrderedTable<String, ExportEntry>,
}

impl ExportTable {
    /// Parse the export table at `offset`.
    pub fn parse(
        reader: &mut BinaryReader<'_>,
        offset: usize,
        max_name_len: usize,
    ) -> Result<Self, RelmodError> {
        reader.seek(offset);
        let count = reader.read_u32_le()?;
        let mut entries = OrderedTable::new();

        for _ in 0..count {
            let name_offset = reader.read_u32_le()?;
            let func_offset = reader.read_u32_le()?;

            let name_pos = offset
                .checked_add(name_offset as usize)
                .ok_or(RelmodError::TruncatedStream { offset, wanted: name_offset as usize })?;
            let name = reader.read_terminated_at(name_pos, &EXPORT_NAME_TERMINATORS, max_name_len)?;

            entries.insert(
                name.clone(),
                ExportEntry {
                    name,
                    offset: func_offset,
                },
            );
        }

        log::debug!("[RELMOD Export] parsed {} export(s)", entries.len());
        Ok(ExportTable { entries })
    }

    /// Number of distinct export names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an export by name.
    pub fn get(&self, name: &str) -> Option<&ExportEntry> {
        self.entries.get(&String::from(name))
    }

    /// Iterate exports in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.values()
    }
}
