//! A fully parsed RELMOD module.
//!
//! Tables are parsed once, straight from the stream, and never change
//! afterwards. A fresh load always re-parses from scratch.

use alloc::vec::Vec;

use crate::exports::ExportTable;
use crate::header::ModuleHeader;
use crate::imports::ImportTable;
use crate::reader::BinaryReader;
use crate::reloc::RelocationTable;
use crate::{LoaderConfig, RelmodError};

/// The three tables following the code segment.
#[derive(Debug, Clone, Default)]
pub struct ModuleTables {
    /// Internal fixups.
    pub relocations: RelocationTable,
    /// Named entry points.
    pub exports: ExportTable,
    /// External references.
    pub imports: ImportTable,
}

impl ModuleTables {
    /// Parse all tables located by `header`.
    pub fn parse(
        data: &[u8],
        header: &ModuleHeader,
        max_name_len: usize,
    ) -> Result<Self, RelmodError> {
        let mut reader = BinaryReader::new(data);
        let relocations = RelocationTable::parse(&mut reader, header.relocs_offset as usize)?;
        let exports = ExportTable::parse(&mut reader, header.main_funcs_offset as usize, max_name_len)?;
        let imports = ImportTable::parse(&mut reader, header.imports_offset as usize, max_name_len)?;
        Ok(ModuleTables {
            relocations,
            exports,
            imports,
        })
    }
}

/// A parsed module: header, raw code and tables.
#[derive(Debug, Clone)]
pub struct RelModule {
    /// Segment offsets and module name.
    pub header: ModuleHeader,
    /// Unrelocated code segment.
    pub code: Vec<u8>,
    /// Relocation, export and import tables.
    pub tables: ModuleTables,
}

impl RelModule {
    /// Parse the header and code segment only.
    pub fn parse_header(
        data: &[u8],
        max_name_len: usize,
    ) -> Result<(ModuleHeader, Vec<u8>), RelmodError> {
        let mut reader = BinaryReader::new(data);
        let header = ModuleHeader::parse(&mut reader, max_name_len)?;
        let code = Vec::from(header.read_code(&mut reader)?);
        log::debug!(
            "[RELMOD Module] '{}': {} byte(s) of code at {:#x}",
            header.name,
            code.len(),
            header.code_offset
        );
        Ok((header, code))
    }

    /// Parse a complete module.
    pub fn parse(data: &[u8], config: &LoaderConfig) -> Result<Self, RelmodError> {
        let (header, code) = Self::parse_header(data, config.max_name_len)?;
        let tables = ModuleTables::parse(data, &header, config.max_name_len)?;
        Ok(RelModule {
            header,
            code,
            tables,
        })
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.header.name
    }
}
