//! relmod-load: host-side driver for the `relmod` crate.
//!
//! Reads module files, sources the external symbol map from JSON and runs
//! the load pipeline against an in-memory `ProgramImage`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod output;
pub mod symbols;
