pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use nutricoach_core::SubscriptionTier;

#[derive(Debug, Parser)]
#[command(
    name = "nutricoach",
    about = "Nutricoach engine operator CLI",
    long_about = "Inspect configuration, validate the action whitelist, and run coaching \
                  turns against a fixture context.",
    after_help = "Examples:\n  nutricoach doctor --json\n  nutricoach config\n  nutricoach simulate \"j'ai super faim\" --tier premium"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one or more messages through the engine with a fixture context")]
    Simulate {
        #[arg(required = true, help = "Message(s) to process, in order")]
        messages: Vec<String>,
        #[arg(long, default_value = "free", help = "Subscription tier: free or premium")]
        tier: String,
    },
    #[command(about = "Inspect effective configuration values")]
    Config,
    #[command(about = "Validate configuration, tier budgets, and whitelist integrity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Simulate { messages, tier } => {
            let tier = match tier.trim().to_ascii_lowercase().as_str() {
                "free" => SubscriptionTier::Free,
                "premium" => SubscriptionTier::Premium,
                other => {
                    return exit_with(commands::CommandResult::failure(
                        "simulate",
                        "invalid_tier",
                        format!("unknown tier `{other}` (expected free|premium)"),
                        2,
                    ));
                }
            };
            commands::simulate::run(&messages, tier)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    exit_with(result)
}

fn exit_with(result: commands::CommandResult) -> ExitCode {
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
