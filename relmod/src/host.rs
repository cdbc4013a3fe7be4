//! Host collaborator interfaces.
//!
//! The loader core never depends on a concrete program database. A host
//! provides a writable memory image, a symbol registry and an instruction
//! cache; the symbol map used for import resolution is a separate read-only
//! lookup built before the load starts.

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Region attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionFlags: u32 {
        /// Readable.
        const READ = 0b0001;
        /// Writable.
        const WRITE = 0b0010;
        /// Executable.
        const EXECUTE = 0b0100;
        /// Volatile (memory-mapped I/O).
        const VOLATILE = 0b1000;
        /// Attributes of module code and stub regions.
        const CODE = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
    }
}

/// Failure reported by a host collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// No region backs the address.
    Unmapped(u32),
    /// The region backing the address rejects the access.
    Protected(u32),
    /// A new region would overlap an existing one.
    Overlap(u32),
    /// Decoded-instruction state at the address cannot be stashed or restored.
    CodeUnit(u32),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Unmapped(addr) => write!(f, "unmapped address {:#010x}", addr),
            HostError::Protected(addr) => write!(f, "protected address {:#010x}", addr),
            HostError::Overlap(addr) => write!(f, "region overlap at {:#010x}", addr),
            HostError::CodeUnit(addr) => write!(f, "code unit conflict at {:#010x}", addr),
        }
    }
}

/// Writable memory image the module is linked into.
pub trait MemoryImage {
    /// Read a little-endian word.
    fn read_word(&self, addr: u32) -> Result<u32, HostError>;

    /// Write a little-endian word.
    fn write_word(&mut self, addr: u32, value: u32) -> Result<(), HostError>;

    /// Create a named region initialized with `bytes`.
    fn define_region(
        &mut self,
        name: &str,
        addr: u32,
        bytes: &[u8],
        flags: RegionFlags,
    ) -> Result<(), HostError>;

    /// Whether a defined region backs `addr`.
    fn is_defined(&self, addr: u32) -> bool;
}

/// Host symbol table.
pub trait SymbolRegistry {
    /// Define a function named `name` at `addr`.
    fn define_function(&mut self, addr: u32, name: &str) -> Result<(), HostError>;

    /// Mark `addr` as a program entry point.
    fn add_entry_point(&mut self, addr: u32);
}

/// Host-side decoded-instruction state.
///
/// A raw write under a decoded instruction invalidates it; the engines
/// bracket every patch with `stash` and `restore` so the host can re-decode.
pub trait InstructionCache {
    /// Take the decoded state at `addr` out of the way of a write.
    fn stash(&mut self, addr: u32) -> Result<(), HostError>;

    /// Re-establish the state taken by the last `stash`.
    fn restore(&mut self) -> Result<(), HostError>;

    /// Decode starting at `addr`.
    ///
    /// Returns `false` when an instruction is already decoded there.
    fn disassemble(&mut self, addr: u32) -> Result<bool, HostError>;
}

/// Read-only `name -> absolute address` map of external symbols.
pub trait SymbolLookup {
    /// Absolute address of `name`.
    fn lookup(&self, name: &str) -> Option<u32>;
}

impl SymbolLookup for BTreeMap<String, u32> {
    fn lookup(&self, name: &str) -> Option<u32> {
        self.get(name).copied()
    }
}

impl SymbolLookup for hashbrown::HashMap<String, u32> {
    fn lookup(&self, name: &str) -> Option<u32> {
        self.get(name).copied()
    }
}
