use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Write as _};

/// Output format selection for all subcommands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object on stdout.
    Json,
    /// Indented `key: value` text on stdout.
    #[default]
    Human,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Human => write!(f, "human"),
        }
    }
}

/// Render a JSON value as indented text.
///
/// Integers under keys ending in `address`, `base` or `offset` are shown in hex.
pub fn render_human(value: &Value) -> String {
    let mut out = String::new();
    render_into(&mut out, None, value, 0);
    out
}

fn is_address_key(key: &str) -> bool {
    key.ends_with("address") || key.ends_with("base") || key.ends_with("offset")
}

fn scalar(key: Option<&str>, value: &Value) -> String {
    match value {
        Value::Number(n) => match (key, n.as_u64()) {
            (Some(k), Some(v)) if is_address_key(k) => format!("{:#010x}", v),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        _ => String::new(),
    }
}

fn render_into(out: &mut String, key: Option<&str>, value: &Value, depth: usize) {
    let pad = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                match v {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{pad}{k}:");
                        render_into(out, Some(k), v, depth + 1);
                    }
                    _ => {
                        let _ = writeln!(out, "{pad}{k}: {}", scalar(Some(k), v));
                    }
                }
            }
        }
        Value::Array(items) if items.is_empty() => {
            let _ = writeln!(out, "{pad}(none)");
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{pad}-");
                        render_into(out, key, item, depth + 1);
                    }
                    _ => {
                        let _ = writeln!(out, "{pad}- {}", scalar(key, item));
                    }
                }
            }
        }
        _ => {
            let _ = writeln!(out, "{pad}{}", scalar(key, value));
        }
    }
}

/// Write a successful result to stdout.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T) -> Result<(), std::io::Error> {
    let value = serde_json::to_value(value).map_err(std::io::Error::other)?;
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(&value).map_err(std::io::Error::other)?;
            println!("{json}");
        }
        OutputFormat::Human => print!("{}", render_human(&value)),
    }
    Ok(())
}

/// Write an error to stdout (JSON mode) or stderr (human mode).
pub fn emit_error(format: OutputFormat, exit_code: u8, message: &str) {
    match format {
        OutputFormat::Json => {
            // JSON errors go to stdout so the caller always gets valid JSON on stdout.
            let obj = serde_json::json!({
                "error": message,
                "exit_code": exit_code,
            });
            println!("{obj}");
        }
        OutputFormat::Human => {
            eprintln!("error: {message}");
        }
    }
}
