pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "orderly",
    about = "Orderly operator CLI",
    long_about = "Check readiness, apply migrations, import the product catalog, and run emails through the order pipeline.",
    after_help = "Examples:\n  orderly doctor --json\n  orderly seed catalog.csv\n  orderly process email.txt\n  cat email.txt | orderly process -"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Import products from a catalog CSV file, replacing rows with the same SKU")]
    Seed {
        #[arg(help = "Path to a CSV file with Product_Code, Product_Name, Price, ... columns")]
        path: PathBuf,
    },
    #[command(about = "Run one email through extraction, validation and rendering")]
    Process {
        #[arg(help = "Path to a file holding the email body, or `-` for stdin")]
        input: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { path } => commands::seed::run(&path),
        Command::Process { input } => commands::process::run(&input),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
