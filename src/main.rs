mod cli;
mod commands;
mod config;
mod executor;
mod exit_codes;
mod paths;
mod testutil;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use executor::SystemExecutor;
use exit_codes::{AGGREGATE_FAILURE, AGGREGATE_SUCCESS};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(AGGREGATE_FAILURE);
        }
    }
}

/// `--verbose` forces debug; otherwise `RUST_LOG` applies, falling back to warn.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the process exit code: the aggregate install result for
/// `install`, zero for everything else.
fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Install { dry_run } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let mut executor = SystemExecutor::new(&config.package_dir);
            let mut progress = std::io::stderr();
            let result = commands::cmd_install(&config, dry_run, &mut executor, &mut progress)?;
            output(&result, cli.json, commands::format_install_human)?;
            Ok(result.result)
        }
        Command::Plan => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let result = commands::cmd_plan(&config);
            output(&result, cli.json, commands::format_plan_human)?;
            Ok(AGGREGATE_SUCCESS)
        }
        Command::Init {
            package_dir,
            force,
            show_path,
        } => {
            let config_path = match cli.config {
                Some(path) => path,
                None => config::default_config_path()?,
            };
            if show_path {
                println!("{}", config_path.display());
                return Ok(AGGREGATE_SUCCESS);
            }

            let inputs = commands::InitInputs { package_dir, force };
            let result = commands::cmd_init(inputs, &config_path)?;
            output(&result, cli.json, commands::format_init_human)?;
            Ok(AGGREGATE_SUCCESS)
        }
    }
}

fn output<T: serde::Serialize>(result: &T, json: bool, human_fn: fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let text = human_fn(result);
        if !text.is_empty() {
            println!("{}", text);
        }
    }
    Ok(())
}
