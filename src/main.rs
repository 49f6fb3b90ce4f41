use clap::{Parser, Subcommand};
use std::process::ExitCode;

use coin_digest::models::settings::BotSettings;
use coin_digest::services::scheduler::RunOutcome;
use coin_digest::AppState;

#[derive(Parser)]
#[command(name = "coin-digest", version, about = "Crypto news relay and daily indicator report")]
struct Cli {
    /// Print messages to stdout instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll news on an interval and send the daily report (default)
    Run,
    /// Run a single news poll and exit
    News,
    /// Build and send the daily report once and exit
    Report,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let settings = match BotSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::build(settings, cli.dry_run) {
        Ok(state) => state,
        Err(e) => {
            log::error!("startup failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            log::info!("🚀 coin-digest starting");
            match coin_digest::run(state).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    log::error!("scheduler stopped: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::News => match state.news.run().await {
            RunOutcome::Completed(summary) => {
                log::info!("delivered {} item(s)", summary.delivered);
                ExitCode::SUCCESS
            }
            RunOutcome::Skipped => ExitCode::SUCCESS,
            RunOutcome::Failed(reason) => {
                log::error!("{}", reason);
                ExitCode::FAILURE
            }
        },
        Command::Report => match state.report.run().await {
            RunOutcome::Completed(_) | RunOutcome::Skipped => ExitCode::SUCCESS,
            RunOutcome::Failed(reason) => {
                log::error!("{}", reason);
                ExitCode::FAILURE
            }
        },
    }
}
