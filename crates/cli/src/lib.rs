pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "spinbot",
    about = "SpinBot operator CLI",
    long_about = "Check SpinBot runtime readiness, apply migrations, inspect config, and audit selection fairness.",
    after_help = "Examples:\n  spinbot doctor --json\n  spinbot config\n  spinbot weights --channel C123 --user U1 --user U2\n  spinbot history --channel C123 --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show the fairness weights and pick odds for a channel")]
    Weights {
        #[arg(long, help = "Channel id whose selection history is used")]
        channel: String,
        #[arg(
            long = "user",
            help = "Candidate user id; defaults to everyone in the recent history"
        )]
        users: Vec<String>,
    },
    #[command(about = "List the most recent selections recorded for a channel")]
    History {
        #[arg(long, help = "Channel id to list")]
        channel: String,
        #[arg(long, default_value_t = 10, help = "Maximum number of records")]
        limit: usize,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Weights { channel, users } => commands::weights::run(&channel, &users),
        Command::History { channel, limit } => commands::history::run(&channel, limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
