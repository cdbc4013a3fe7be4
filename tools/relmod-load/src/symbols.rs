//! External symbol map sourcing.
//!
//! The map is a JSON object of `name -> address`. The packer writes plain
//! integers; hand-written maps may use `"0x..."` strings instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadToolError;

/// Default file name, looked up next to the module.
pub const DEFAULT_SYMBOL_FILE: &str = "os_funcs.json";

/// An address as written in a JSON or TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressValue {
    Int(i64),
    Text(String),
}

impl AddressValue {
    /// Convert to a 32-bit address.
    pub fn to_u32(&self) -> Result<u32, String> {
        match self {
            AddressValue::Int(v) => {
                u32::try_from(*v).map_err(|_| format!("{} is outside the 32-bit address space", v))
            }
            AddressValue::Text(s) => parse_address(s),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal address.
pub fn parse_address(text: &str) -> Result<u32, String> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse::<u32>(),
    };
    parsed.map_err(|e| e.to_string())
}

/// Parse a symbol map from JSON text.
pub fn parse_symbol_map(text: &str) -> Result<BTreeMap<String, u32>, LoadToolError> {
    let raw: BTreeMap<String, AddressValue> = serde_json::from_str(text)?;
    raw.into_iter()
        .map(|(name, value)| match value.to_u32() {
            Ok(addr) => Ok((name, addr)),
            Err(reason) => Err(LoadToolError::InvalidSymbolMap { name, reason }),
        })
        .collect()
}

/// Read and parse the symbol map at `path`.
pub fn load_symbol_map(path: &Path) -> Result<BTreeMap<String, u32>, LoadToolError> {
    if !path.is_file() {
        return Err(LoadToolError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path)?;
    let map = parse_symbol_map(&text)?;
    log::info!("[RELMOD Symbols] {} symbol(s) from {}", map.len(), path.display());
    Ok(map)
}
