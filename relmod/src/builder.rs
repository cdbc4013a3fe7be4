//! RELMOD image encoder.
//!
//! Produces the layout the packer emits: header, code, relocation table,
//! export table with its trailing name pool, import groups and finally the
//! module name (`<name>.sym*\r\n`, padded with `0xFD`).

use alloc::string::String;
use alloc::vec::Vec;

use crate::format::{HEADER_SIZE, IMPORT_ALIGN, NAME_DELIMITER, RELOC_SENTINEL};
use crate::reloc::RelocKind;

const NAME_PAD: u8 = 0xFD;

/// A reference site to encode: `(code offset, kind, addend)`.
pub type RefSpec = (u32, RelocKind, u32);

/// Builder for RELMOD images.
#[derive(Debug, Clone, Default)]
pub struct ModuleBuilder {
    name: String,
    code: Vec<u8>,
    relocations: Vec<RefSpec>,
    exports: Vec<(String, u32)>,
    imports: Vec<(String, Vec<RefSpec>)>,
}

impl ModuleBuilder {
    /// Start a module; the stored name becomes `<name>.sym`.
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            ..Self::default()
        }
    }

    /// Set the code segment.
    pub fn code(mut self, code: &[u8]) -> Self {
        self.code = Vec::from(code);
        self
    }

    /// Set the code segment from little-endian words.
    pub fn code_words(mut self, words: &[u32]) -> Self {
        self.code = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self
    }

    /// Append an internal relocation.
    pub fn relocation(mut self, address: u32, kind: RelocKind, addend: u32) -> Self {
        self.relocations.push((address, kind, addend));
        self
    }

    /// Append an export.
    pub fn export(mut self, name: &str, offset: u32) -> Self {
        self.exports.push((String::from(name), offset));
        self
    }

    /// Append an import group.
    pub fn import(mut self, symbol: &str, refs: &[RefSpec]) -> Self {
        self.imports.push((String::from(symbol), Vec::from(refs)));
        self
    }

    fn encode_ref(out: &mut Vec<u8>, &(address, kind, addend): &RefSpec) {
        out.extend_from_slice(&((address & !3) | kind.bits()).to_le_bytes());
        if kind == RelocKind::Hi16 {
            out.extend_from_slice(&addend.to_le_bytes());
        }
    }

    fn pad_to(out: &mut Vec<u8>, base: usize, align: usize, byte: u8) {
        while (base + out.len()) % align != 0 {
            out.push(byte);
        }
    }

    fn encode_relocations(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for spec in &self.relocations {
            Self::encode_ref(&mut out, spec);
        }
        out.extend_from_slice(&RELOC_SENTINEL.to_le_bytes());
        out
    }

    fn encode_exports(&self, table_offset: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut names = Vec::new();
        let strings_base = 4 + self.exports.len() * 8;

        out.extend_from_slice(&(self.exports.len() as u32).to_le_bytes());
        for (name, offset) in &self.exports {
            out.extend_from_slice(&((strings_base + names.len()) as u32).to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        out.extend(names);
        // Keep the import table word-aligned.
        Self::pad_to(&mut out, table_offset, 4, 0);
        out
    }

    fn encode_imports(&self, table_offset: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.imports.len() as u32).to_le_bytes());
        for (symbol, refs) in &self.imports {
            out.extend_from_slice(symbol.as_bytes());
            out.push(0);
            Self::pad_to(&mut out, table_offset, IMPORT_ALIGN, 0);
            out.extend_from_slice(&(refs.len() as u32).to_le_bytes());
            for spec in refs {
                Self::encode_ref(&mut out, spec);
            }
        }
        out
    }

    fn encode_name(&self, offset: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(b".sym");
        out.push(NAME_DELIMITER);
        out.extend_from_slice(b"\r\n");
        Self::pad_to(&mut out, offset, 4, NAME_PAD);
        out
    }

    /// Encode the module.
    pub fn build(&self) -> Vec<u8> {
        let code_offset = HEADER_SIZE;
        let relocs_offset = code_offset + self.code.len();
        let relocs = self.encode_relocations();
        let exports_offset = relocs_offset + relocs.len();
        let exports = self.encode_exports(exports_offset);
        let imports_offset = exports_offset + exports.len();
        let imports = self.encode_imports(imports_offset);
        let name_offset = imports_offset + imports.len();
        let name = self.encode_name(name_offset);

        let mut out = Vec::with_capacity(name_offset + name.len());
        for offset in [code_offset, relocs_offset, exports_offset, imports_offset, name_offset] {
            out.extend_from_slice(&(offset as u32).to_le_bytes());
        }
        out.extend_from_slice(&self.code);
        out.extend(relocs);
        out.extend(exports);
        out.extend(imports);
        out.extend(name);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format;

    #[test]
    fn test_empty_module_layout() {
        let bytes = ModuleBuilder::new("EMPTY").build();
        // header, sentinel, export count, import count, name
        assert_eq!(&bytes[0..4], &20u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &20u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &0xFFFF_FFFFu32.to_le_bytes());
        assert_eq!(&bytes[32..44], b"EMPTY.sym*\r\n");
        assert!(format::probe(&bytes).is_some());
    }

    #[test]
    fn test_name_is_padded() {
        let bytes = ModuleBuilder::new("AB").build();
        // "AB.sym*\r\n" is 9 bytes, padded to 12 with 0xFD.
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(bytes[bytes.len() - 1], 0xFD);
    }

    #[test]
    fn test_hi16_reference_carries_addend() {
        let bytes = ModuleBuilder::new("M")
            .code(&[0u8; 8])
            .relocation(0x4, RelocKind::Hi16, 0xBEEF)
            .build();
        assert_eq!(&bytes[28..32], &0x5u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &0xBEEFu32.to_le_bytes());
        assert_eq!(&bytes[36..40], &0xFFFF_FFFFu32.to_le_bytes());
    }
}
