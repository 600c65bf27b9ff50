pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "partbot",
    about = "Partbot operator CLI",
    long_about = "Inspect partbot configuration, check inventory sheet readiness, and run one-off part lookups.",
    after_help = "Examples:\n  partbot doctor --json\n  partbot config\n  partbot lookup A1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the service account key, and a live inventory fetch")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve one part code against the live sheet and print the chat reply")]
    Lookup {
        #[arg(help = "Part code to look up (surrounding whitespace is ignored)")]
        code: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Lookup { code } => commands::lookup::run(&code),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
