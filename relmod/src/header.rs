//! Module header: five segment offsets and the module name.

use alloc::string::String;

use crate::format::NAME_DELIMITER;
use crate::reader::BinaryReader;
use crate::RelmodError;

/// Parsed RELMOD header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModuleHeader {
    /// Start of the code segment.
    pub code_offset: u32,
    /// Start of the relocation table (and end of the code segment).
    pub relocs_offset: u32,
    /// Start of the export table.
    pub main_funcs_offset: u32,
    /// Start of the import table.
    pub imports_offset: u32,
    /// Start of the module name.
    pub name_offset: u32,
    /// Module name, read up to the `*` delimiter.
    pub name: String,
}

impl ModuleHeader {
    /// Parse the header from the start of the stream.
    ///
    /// Leaves the cursor just past the five offsets.
    pub fn parse(reader: &mut BinaryReader<'_>, max_name_len: usize) -> Result<Self, RelmodError> {
        reader.seek(0);
        let code_offset = reader.read_u32_le()?;
        let relocs_offset = reader.read_u32_le()?;
        let main_funcs_offset = reader.read_u32_le()?;
        let imports_offset = reader.read_u32_le()?;
        let name_offset = reader.read_u32_le()?;

        if relocs_offset < code_offset {
            return Err(RelmodError::MalformedHeader(alloc::format!(
                "relocation table at {:#x} precedes code at {:#x}",
                relocs_offset, code_offset
            )));
        }

        let name = reader.read_terminated_at(name_offset as usize, &[NAME_DELIMITER], max_name_len)?;

        Ok(ModuleHeader {
            code_offset,
            relocs_offset,
            main_funcs_offset,
            imports_offset,
            name_offset,
            name,
        })
    }

    /// Length of the code segment in bytes.
    pub fn code_len(&self) -> usize {
        (self.relocs_offset - self.code_offset) as usize
    }

    /// Read the raw code segment.
    pub fn read_code<'a>(&self, reader: &mut BinaryReader<'a>) -> Result<&'a [u8], RelmodError> {
        reader.seek(self.code_offset as usize);
        reader.read_bytes(self.code_len())
    }
}
