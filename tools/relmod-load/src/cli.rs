use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::symbols::parse_address;

/// Parse, link and inspect RELMOD overlay modules.
#[derive(Parser, Debug)]
#[command(name = "relmod-load", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format for all subcommands.
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub output: OutputFormat,

    /// TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether a file is a RELMOD module.
    Probe(FileArg),

    /// Print the parsed header and tables.
    Dump(DumpArgs),

    /// Link a module into an in-memory image and report the result.
    Load(LoadArgs),
}

/// Argument struct for subcommands that only need a module path.
#[derive(clap::Args, Debug)]
pub struct FileArg {
    /// Module file.
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct DumpArgs {
    /// Module file.
    pub file: PathBuf,

    /// Maximum name length scanned for a terminator.
    #[arg(long)]
    pub max_name_len: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct LoadArgs {
    /// Module file.
    pub file: PathBuf,

    /// Load address (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_base)]
    pub base: Option<u32>,

    /// JSON symbol map (defaults to os_funcs.json next to the module).
    #[arg(long)]
    pub symbols: Option<PathBuf>,

    /// Maximum name length scanned for a terminator.
    #[arg(long)]
    pub max_name_len: Option<usize>,

    /// Do not decode the entry point after linking.
    #[arg(long)]
    pub no_disassemble: bool,

    /// Write the linked code segment to this file.
    #[arg(long)]
    pub image_out: Option<PathBuf>,
}

fn parse_base(text: &str) -> Result<u32, String> {
    parse_address(text)
}
