//! `alertmanager` binary entry point.

use alertmanager_cli::{execute, Cli, CliError};
use alertmanager_core::{
    core_version, default_log_level, init_logging, AlertManagerConfig, LogTarget,
};
use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let target = match &cli.log_dir {
        Some(dir) => LogTarget::File(dir.clone()),
        None => LogTarget::Stderr,
    };
    if let Err(err) = init_logging(level, target) {
        eprintln!("alertmanager: logging init failed: {err}");
        return ExitCode::from(1);
    }
    info!(
        "event=cli_start module=cli status=ok core_version={}",
        core_version()
    );

    let result = AlertManagerConfig::from_env()
        .map_err(|err| CliError::Server(err.to_string()))
        .and_then(|config| execute(&cli, &config));

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                "event=cli_command module=cli status=error exit_code={} error={err}",
                err.exit_code()
            );
            eprintln!("alertmanager: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
