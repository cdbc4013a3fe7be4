//! Subcommand handlers.
//!
//! Every handler returns a JSON value so `main` can emit it in either
//! output format.

use std::fs;
use std::path::Path;

use relmod::format::{self, LoadSpec};
use relmod::{Loader, LoaderConfig, ProgramImage, RelModule};
use serde_json::{json, Value};

use crate::cli::{DumpArgs, FileArg, LoadArgs};
use crate::config::{Overrides, ToolConfig};
use crate::error::LoadToolError;
use crate::symbols::load_symbol_map;

fn read_module(path: &Path) -> Result<(Vec<u8>, LoadSpec), LoadToolError> {
    if !path.is_file() {
        return Err(LoadToolError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    let spec = format::probe(&bytes).ok_or_else(|| LoadToolError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    Ok((bytes, spec))
}

fn file_config(config: Option<&Path>) -> Result<ToolConfig, LoadToolError> {
    match config {
        Some(path) => ToolConfig::load(path),
        None => Ok(ToolConfig::default()),
    }
}

/// `probe <FILE>`
pub fn probe(args: &FileArg) -> Result<Value, LoadToolError> {
    let (bytes, spec) = read_module(&args.file)?;
    Ok(json!({
        "file": args.file.display().to_string(),
        "size": bytes.len(),
        "tag": spec.tag,
        "base": spec.base,
        "processor": spec.processor,
    }))
}

/// `dump <FILE>`
pub fn dump(args: &DumpArgs, config: Option<&Path>) -> Result<Value, LoadToolError> {
    let file = file_config(config)?;
    let (bytes, _) = read_module(&args.file)?;

    let loader = LoaderConfig {
        max_name_len: args
            .max_name_len
            .or(file.max_name_len)
            .unwrap_or(LoaderConfig::default().max_name_len),
        ..LoaderConfig::default()
    };
    let module = RelModule::parse(&bytes, &loader)?;

    let relocations: Vec<_> = module.tables.relocations.iter().collect();
    let exports: Vec<_> = module.tables.exports.iter().collect();
    let imports: Vec<_> = module.tables.imports.symbols().collect();

    Ok(json!({
        "header": module.header,
        "code_size": module.code.len(),
        "relocations": relocations,
        "exports": exports,
        "imports": imports,
    }))
}

/// `load <FILE>`
pub fn load(args: &LoadArgs, config: Option<&Path>) -> Result<Value, LoadToolError> {
    let file = file_config(config)?;
    let overrides = Overrides {
        base: args.base,
        symbols: args.symbols.clone(),
        max_name_len: args.max_name_len,
        no_disassemble: args.no_disassemble,
    };
    let settings = file.resolve(&overrides, &args.file)?;

    let (bytes, _) = read_module(&args.file)?;
    let symbols = load_symbol_map(&settings.symbols)?;

    let mut image = ProgramImage::new();
    let report = Loader::new(settings.loader, &symbols).load(&bytes, &mut image)?;

    let mut value = serde_json::to_value(&report)?;
    if let Some(out) = &args.image_out {
        let code = image
            .region(&report.name)
            .map(|region| region.bytes.as_slice())
            .unwrap_or_default();
        fs::write(out, code)?;
        value["image_out"] = Value::String(out.display().to_string());
    }
    Ok(value)
}
