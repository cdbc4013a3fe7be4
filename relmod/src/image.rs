//! In-memory reference host.
//!
//! `ProgramImage` implements all three collaborator traits on plain
//! collections: byte regions, a function table, an entry point set and a map
//! of decoded instruction words. Host tools use it to run a load without a
//! program database, and the tests use it to observe every write.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use crate::host::{HostError, InstructionCache, MemoryImage, RegionFlags, SymbolRegistry};

/// A contiguous named region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Region name.
    pub name: String,
    /// Absolute start address.
    pub start: u32,
    /// Contents.
    pub bytes: Vec<u8>,
    /// Attributes.
    pub flags: RegionFlags,
}

impl Region {
    /// One past the last address (as u64 so a region may end at 4 GiB).
    pub fn end(&self) -> u64 {
        self.start as u64 + self.bytes.len() as u64
    }

    /// Whether `[addr, addr + len)` lies inside the region.
    pub fn contains(&self, addr: u32, len: u32) -> bool {
        addr >= self.start && addr as u64 + len as u64 <= self.end()
    }

    fn offset(&self, addr: u32) -> usize {
        (addr - self.start) as usize
    }
}

/// In-memory program image.
#[derive(Debug, Clone, Default)]
pub struct ProgramImage {
    regions: Vec<Region>,
    functions: BTreeMap<u32, String>,
    entry_points: BTreeSet<u32>,
    decoded: BTreeMap<u32, u32>,
    /// Address and decoded word taken by the pending `stash`.
    stashed: Option<(u32, Option<u32>)>,
    writes: usize,
}

impl ProgramImage {
    /// Create an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    fn region_for(&self, addr: u32, len: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(addr, len))
    }

    fn region_for_mut(&mut self, addr: u32, len: u32) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.contains(addr, len))
    }

    /// All regions in creation order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region by name.
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Change the attributes of a named region.
    pub fn protect(&mut self, name: &str, flags: RegionFlags) -> bool {
        match self.regions.iter_mut().find(|r| r.name == name) {
            Some(region) => {
                region.flags = flags;
                true
            }
            None => false,
        }
    }

    /// Defined functions by address.
    pub fn functions(&self) -> &BTreeMap<u32, String> {
        &self.functions
    }

    /// Function defined at `addr`.
    pub fn function_at(&self, addr: u32) -> Option<&str> {
        self.functions.get(&addr).map(String::as_str)
    }

    /// Entry point addresses.
    pub fn entry_points(&self) -> &BTreeSet<u32> {
        &self.entry_points
    }

    /// Decoded instruction word at `addr`.
    pub fn decoded_at(&self, addr: u32) -> Option<u32> {
        self.decoded.get(&addr).copied()
    }

    /// Number of decoded instructions.
    pub fn decoded_count(&self) -> usize {
        self.decoded.len()
    }

    /// Number of successful word writes.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl MemoryImage for ProgramImage {
    fn read_word(&self, addr: u32) -> Result<u32, HostError> {
        let region = self.region_for(addr, 4).ok_or(HostError::Unmapped(addr))?;
        if !region.flags.contains(RegionFlags::READ) {
            return Err(HostError::Protected(addr));
        }
        let off = region.offset(addr);
        let b = &region.bytes[off..off + 4];
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn write_word(&mut self, addr: u32, value: u32) -> Result<(), HostError> {
        let region = self.region_for_mut(addr, 4).ok_or(HostError::Unmapped(addr))?;
        if !region.flags.contains(RegionFlags::WRITE) {
            return Err(HostError::Protected(addr));
        }
        let off = region.offset(addr);
        region.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
        self.writes += 1;
        Ok(())
    }

    fn define_region(
        &mut self,
        name: &str,
        addr: u32,
        bytes: &[u8],
        flags: RegionFlags,
    ) -> Result<(), HostError> {
        let end = addr as u64 + bytes.len() as u64;
        if end > u32::MAX as u64 + 1 {
            return Err(HostError::Overlap(addr));
        }
        if self
            .regions
            .iter()
            .any(|r| (addr as u64) < r.end() && (r.start as u64) < end)
        {
            return Err(HostError::Overlap(addr));
        }
        self.regions.push(Region {
            name: String::from(name),
            start: addr,
            bytes: Vec::from(bytes),
            flags,
        });
        Ok(())
    }

    fn is_defined(&self, addr: u32) -> bool {
        self.region_for(addr, 1).is_some()
    }
}

impl SymbolRegistry for ProgramImage {
    fn define_function(&mut self, addr: u32, name: &str) -> Result<(), HostError> {
        if !self.is_defined(addr) {
            return Err(HostError::Unmapped(addr));
        }
        if let Some(previous) = self.functions.insert(addr, String::from(name)) {
            log::debug!("[RELMOD Image] function '{}' at {:#010x} renamed to '{}'", previous, addr, name);
        }
        Ok(())
    }

    fn add_entry_point(&mut self, addr: u32) {
        self.entry_points.insert(addr);
    }
}

impl InstructionCache for ProgramImage {
    fn stash(&mut self, addr: u32) -> Result<(), HostError> {
        if self.stashed.is_some() {
            return Err(HostError::CodeUnit(addr));
        }
        let word = self.decoded.remove(&addr);
        self.stashed = Some((addr, word));
        Ok(())
    }

    fn restore(&mut self) -> Result<(), HostError> {
        let (addr, word) = self.stashed.take().ok_or(HostError::CodeUnit(0))?;
        if word.is_some() {
            // Re-decode from whatever the write left behind.
            let current = self.read_word(addr).map_err(|_| HostError::CodeUnit(addr))?;
            self.decoded.insert(addr, current);
        }
        Ok(())
    }

    fn disassemble(&mut self, addr: u32) -> Result<bool, HostError> {
        if self.decoded.contains_key(&addr) {
            return Ok(false);
        }
        let region = self.region_for(addr, 4).ok_or(HostError::Unmapped(addr))?;
        if !region.flags.contains(RegionFlags::EXECUTE) {
            return Err(HostError::Protected(addr));
        }

        // Linear sweep to the end of the region.
        let mut words = Vec::new();
        let mut pc = addr;
        while region.contains(pc, 4) {
            let off = region.offset(pc);
            let b = &region.bytes[off..off + 4];
            words.push((pc, u32::from_le_bytes([b[0], b[1], b[2], b[3]])));
            pc = match pc.checked_add(4) {
                Some(next) => next,
                None => break,
            };
        }
        for (pc, word) in words {
            self.decoded.entry(pc).or_insert(word);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_word() {
        let mut image = ProgramImage::new();
        image.define_region("CODE", 0x1000, &[0u8; 8], RegionFlags::CODE).unwrap();
        image.write_word(0x1004, 0xAABB_CCDD).unwrap();
        assert_eq!(image.read_word(0x1004).unwrap(), 0xAABB_CCDD);
        assert_eq!(image.region("CODE").unwrap().bytes[4], 0xDD);
        assert_eq!(image.write_count(), 1);
    }

    #[test]
    fn test_straddling_access_is_unmapped() {
        let mut image = ProgramImage::new();
        image.define_region("CODE", 0x1000, &[0u8; 8], RegionFlags::CODE).unwrap();
        assert_eq!(image.read_word(0x1006), Err(HostError::Unmapped(0x1006)));
        assert_eq!(image.read_word(0x0FFC), Err(HostError::Unmapped(0x0FFC)));
    }

    #[test]
    fn test_protected_region_rejects_writes() {
        let mut image = ProgramImage::new();
        image.define_region("CODE", 0x1000, &[0u8; 4], RegionFlags::CODE).unwrap();
        assert!(image.protect("CODE", RegionFlags::READ));
        assert_eq!(image.write_word(0x1000, 1), Err(HostError::Protected(0x1000)));
        assert!(!image.protect("MISSING", RegionFlags::READ));
    }

    #[test]
    fn test_overlapping_regions_rejected() {
        let mut image = ProgramImage::new();
        image.define_region("A", 0x1000, &[0u8; 0x10], RegionFlags::CODE).unwrap();
        assert_eq!(
            image.define_region("B", 0x100C, &[0u8; 4], RegionFlags::CODE),
            Err(HostError::Overlap(0x100C))
        );
        image.define_region("C", 0x1010, &[0u8; 4], RegionFlags::CODE).unwrap();
        assert!(image.is_defined(0x1013));
        assert!(!image.is_defined(0x1014));
    }

    #[test]
    fn test_region_at_top_of_address_space() {
        let mut image = ProgramImage::new();
        image.define_region("TOP", 0xFFFF_FFFC, &[1, 2, 3, 4], RegionFlags::CODE).unwrap();
        assert_eq!(image.read_word(0xFFFF_FFFC).unwrap(), 0x0403_0201);
        assert!(image.disassemble(0xFFFF_FFFC).unwrap());
    }

    #[test]
    fn test_define_function_requires_region() {
        let mut image = ProgramImage::new();
        assert_eq!(image.define_function(0x2000, "main"), Err(HostError::Unmapped(0x2000)));
        image.define_region("CODE", 0x2000, &[0u8; 4], RegionFlags::CODE).unwrap();
        image.define_function(0x2000, "main").unwrap();
        assert_eq!(image.function_at(0x2000), Some("main"));
    }

    #[test]
    fn test_disassemble_once() {
        let mut image = ProgramImage::new();
        let code: Vec<u8> = [0x2402_0001u32, 0x03E0_0008].iter().flat_map(|w| w.to_le_bytes()).collect();
        image.define_region("CODE", 0x1000, &code, RegionFlags::CODE).unwrap();

        assert!(image.disassemble(0x1000).unwrap());
        assert_eq!(image.decoded_count(), 2);
        assert_eq!(image.decoded_at(0x1004), Some(0x03E0_0008));
        assert!(!image.disassemble(0x1000).unwrap());
    }

    #[test]
    fn test_stash_restore_redecodes() {
        let mut image = ProgramImage::new();
        image.define_region("CODE", 0x1000, &[0u8; 4], RegionFlags::CODE).unwrap();
        image.disassemble(0x1000).unwrap();

        image.stash(0x1000).unwrap();
        assert_eq!(image.decoded_at(0x1000), None);
        image.write_word(0x1000, 0x0800_0010).unwrap();
        image.restore().unwrap();
        assert_eq!(image.decoded_at(0x1000), Some(0x0800_0010));
    }

    #[test]
    fn test_nested_stash_conflicts() {
        let mut image = ProgramImage::new();
        image.stash(0x1000).unwrap();
        assert_eq!(image.stash(0x1004), Err(HostError::CodeUnit(0x1004)));
        image.restore().unwrap();
        assert_eq!(image.restore(), Err(HostError::CodeUnit(0)));
    }
}
