//! RELMOD Loader
//!
//! This crate decodes the relocatable module container ("RELMOD", `.mod`)
//! used by PlayStation titles for overlay code, and links it into an
//! addressable MIPS image: internal relocations are applied against the load
//! base, imports are resolved against a caller-supplied symbol map, and the
//! exported entry points are registered with the host.
//!
//! The crate never touches a concrete disassembler or program database.
//! Everything host-side goes through three narrow traits in [`host`].
//!
//! # Architecture
//!
//! - `reader`: bounds-checked little-endian cursor over the module stream
//! - `format`: layout constants + format probe
//! - `header` / `reloc` / `exports` / `imports`: table parsers
//! - `module`: the fully parsed module (`RelModule`)
//! - `table`: insertion-ordered, overwrite-on-duplicate tables
//! - `patch`: MIPS field patch rules shared by both fixup engines
//! - `relocate` / `resolve`: relocation and import resolution engines
//! - `linker`: export, stub and entry point registration
//! - `loader`: the load pipeline state machine
//! - `host`: collaborator traits (`MemoryImage`, `SymbolRegistry`, `InstructionCache`)
//! - `image`: in-memory reference host (`ProgramImage`)
//! - `builder`: RELMOD image encoder

#![no_std]

extern crate alloc;

pub mod builder;
pub mod exports;
pub mod format;
pub mod header;
pub mod host;
pub mod image;
pub mod imports;
pub mod linker;
pub mod loader;
pub mod module;
pub mod patch;
pub mod reader;
pub mod reloc;
pub mod relocate;
pub mod resolve;
pub mod table;

use alloc::string::String;
use core::fmt;

pub use builder::ModuleBuilder;
pub use host::{HostError, InstructionCache, MemoryImage, RegionFlags, SymbolLookup, SymbolRegistry};
pub use image::ProgramImage;
pub use loader::{LoadFailure, LoadReport, Loader, Phase};
pub use module::RelModule;

/// Errors produced while parsing or linking a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelmodError {
    /// A read ran past the end of the module stream.
    TruncatedStream { offset: usize, wanted: usize },
    /// Header offsets are inconsistent, or a name scan exceeded its bound.
    MalformedHeader(String),
    /// An import name is missing from the symbol map.
    UnresolvedSymbol(String),
    /// The destination image could not be read at a patch site.
    MemoryReadFailure { addr: u32 },
    /// The destination image rejected a write.
    MemoryWriteFailure { addr: u32 },
    /// The host could not stash or restore instruction state at a patch site.
    CodeUnitConflict { addr: u32 },
    /// The host refused to create a region.
    RegionConflict { name: String, addr: u32 },
    /// The load was cancelled before the given phase started.
    Cancelled { phase: Phase },
}

impl fmt::Display for RelmodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelmodError::TruncatedStream { offset, wanted } => {
                write!(f, "truncated stream: {} byte(s) wanted at offset {:#x}", wanted, offset)
            }
            RelmodError::MalformedHeader(msg) => write!(f, "malformed header: {}", msg),
            RelmodError::UnresolvedSymbol(name) => write!(f, "unresolved symbol '{}'", name),
            RelmodError::MemoryReadFailure { addr } => {
                write!(f, "memory read failed at {:#010x}", addr)
            }
            RelmodError::MemoryWriteFailure { addr } => {
                write!(f, "memory write failed at {:#010x}", addr)
            }
            RelmodError::CodeUnitConflict { addr } => {
                write!(f, "instruction state conflict at {:#010x}", addr)
            }
            RelmodError::RegionConflict { name, addr } => {
                write!(f, "cannot create region '{}' at {:#010x}", name, addr)
            }
            RelmodError::Cancelled { phase } => write!(f, "cancelled before {}", phase),
        }
    }
}

impl core::error::Error for RelmodError {}

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Absolute address the code segment is loaded at.
    pub base: u32,
    /// Maximum number of bytes scanned for a delimiter-terminated name.
    pub max_name_len: usize,
    /// Decode the primary entry point once linking is complete.
    pub disassemble_entry: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            base: format::DEFAULT_BASE,
            max_name_len: 256,
            disassemble_entry: true,
        }
    }
}
