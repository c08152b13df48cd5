//! vaultenv CLI - Materialize .env files from a property schema and Azure Key Vault.

use clap::Parser;
use std::process;
use vaultenv::cli::{Cli, Commands};
use vaultenv::commands::{self, Output};

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_tracing(cli.verbose);

    let result = run_command(&cli, human);

    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Log to stderr so logs never mix with the result on stdout.
///
/// `RUST_LOG` wins when set; otherwise `-v` counts pick the level.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vaultenv={}", default_level).into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_command(cli: &Cli, human: bool) -> Result<(), vaultenv::Error> {
    match cli.command {
        None | Some(Commands::Sync) => {
            let result = commands::sync(&cli.run)?;
            output(&result, human);
        }
        Some(Commands::Plan) => {
            let result = commands::plan(&cli.run)?;
            output(&result, human);
        }
        Some(Commands::Whoami) => {
            let result = commands::whoami()?;
            output(&result, human);
        }
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
