use std::process::ExitCode;

use clap::Parser;

use relmod_load::cli::{Cli, Command};
use relmod_load::error::LoadToolError;
use relmod_load::{commands, logger, output};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let config = cli.config.as_deref();
    let result: Result<serde_json::Value, LoadToolError> = match &cli.command {
        Command::Probe(args) => commands::probe(args),
        Command::Dump(args) => commands::dump(args, config),
        Command::Load(args) => commands::load(args, config),
    };

    match result {
        Ok(value) => {
            let _ = output::emit(cli.output, &value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            output::emit_error(cli.output, code, &e.to_string());
            ExitCode::from(code)
        }
    }
}
