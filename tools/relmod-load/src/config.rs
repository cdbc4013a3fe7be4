//! Tool configuration.
//!
//! Values come from an optional TOML file; command-line flags override them.
//!
//! ```toml
//! base = "0x80010000"
//! symbols = "os_funcs.json"
//! max_name_len = 256
//! disassemble_entry = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use relmod::LoaderConfig;
use serde::{Deserialize, Serialize};

use crate::error::LoadToolError;
use crate::symbols::{AddressValue, DEFAULT_SYMBOL_FILE};

/// Contents of a config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub base: Option<AddressValue>,
    pub symbols: Option<PathBuf>,
    pub max_name_len: Option<usize>,
    pub disassemble_entry: Option<bool>,
}

/// Command-line overrides.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base: Option<u32>,
    pub symbols: Option<PathBuf>,
    pub max_name_len: Option<usize>,
    pub no_disassemble: bool,
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub loader: LoaderConfig,
    pub symbols: PathBuf,
}

impl ToolConfig {
    /// Parse a config from TOML text.
    pub fn parse(text: &str) -> Result<Self, LoadToolError> {
        Ok(toml::from_str(text)?)
    }

    /// Read the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, LoadToolError> {
        if !path.is_file() {
            return Err(LoadToolError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Merge with command-line overrides for the module at `module_path`.
    ///
    /// Without an explicit symbol map path the default file next to the
    /// module is used.
    pub fn resolve(&self, overrides: &Overrides, module_path: &Path) -> Result<Settings, LoadToolError> {
        let defaults = LoaderConfig::default();

        let base = match (overrides.base, &self.base) {
            (Some(base), _) => base,
            (None, Some(value)) => value.to_u32().map_err(|reason| LoadToolError::InvalidAddress {
                value: format!("{:?}", value),
                reason,
            })?,
            (None, None) => defaults.base,
        };

        let max_name_len = overrides
            .max_name_len
            .or(self.max_name_len)
            .unwrap_or(defaults.max_name_len);
        if max_name_len == 0 {
            return Err(LoadToolError::ConfigParseError(
                "max_name_len must be at least 1".to_string(),
            ));
        }

        let disassemble_entry = if overrides.no_disassemble {
            false
        } else {
            self.disassemble_entry.unwrap_or(defaults.disassemble_entry)
        };

        let symbols = match overrides.symbols.as_ref().or(self.symbols.as_ref()) {
            Some(path) => path.clone(),
            None => module_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_SYMBOL_FILE),
        };

        Ok(Settings {
            loader: LoaderConfig {
                base,
                max_name_len,
                disassemble_entry,
            },
            symbols,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ToolConfig::parse("").unwrap();
        let settings = config
            .resolve(&Overrides::default(), Path::new("/games/track/TRACK.MOD"))
            .unwrap();
        assert_eq!(settings.loader.base, 0x8000_0000);
        assert_eq!(settings.loader.max_name_len, 256);
        assert!(settings.loader.disassemble_entry);
        assert_eq!(settings.symbols, PathBuf::from("/games/track/os_funcs.json"));
    }

    #[test]
    fn file_values_and_overrides() {
        let config = ToolConfig::parse(
            r#"
            base = "0x80010000"
            symbols = "maps/bios.json"
            max_name_len = 64
            disassemble_entry = true
            "#,
        )
        .unwrap();
        assert_eq!(config.base, Some(AddressValue::Text("0x80010000".into())));

        let settings = config.resolve(&Overrides::default(), Path::new("TRACK.MOD")).unwrap();
        assert_eq!(settings.loader.base, 0x8001_0000);
        assert_eq!(settings.symbols, PathBuf::from("maps/bios.json"));

        let overrides = Overrides {
            base: Some(0x8002_0000),
            max_name_len: Some(32),
            no_disassemble: true,
            ..Overrides::default()
        };
        let settings = config.resolve(&overrides, Path::new("TRACK.MOD")).unwrap();
        assert_eq!(settings.loader.base, 0x8002_0000);
        assert_eq!(settings.loader.max_name_len, 32);
        assert!(!settings.loader.disassemble_entry);
    }

    #[test]
    fn integer_base() {
        let config = ToolConfig::parse("base = 2147549184").unwrap();
        let settings = config.resolve(&Overrides::default(), Path::new("A.MOD")).unwrap();
        assert_eq!(settings.loader.base, 0x8001_0000);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = ToolConfig::parse("bse = 1").unwrap_err();
        assert!(matches!(err, LoadToolError::Toml(_)));
    }

    #[test]
    fn zero_name_bound_rejected() {
        let config = ToolConfig::parse("max_name_len = 0").unwrap();
        let err = config.resolve(&Overrides::default(), Path::new("A.MOD")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
