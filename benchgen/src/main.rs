mod cli;
mod config;
mod experiment;
mod report;
mod results;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use counterfactual::error::RunError;
use counterfactual::exit_codes;

use crate::config::Overrides;
use crate::run::PersistError;

#[derive(Parser)]
#[command(
    name = "benchgen",
    version,
    about = "Counterfactual benchmark dataset generator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    List,
    Generate {
        /// Experiment id; omit with --all to generate every experiment.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        experiment_id: Option<String>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        subjects: Option<u32>,
        #[arg(long)]
        replications: Option<u32>,
        #[arg(long)]
        workers: Option<usize>,
    },
    Report {
        experiment_id: String,
    },
    Clean {
        experiment_id: String,
    },
}

fn main() {
    counterfactual::logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let repo_root = std::env::current_dir()?;
    match cli.command {
        Command::List => cli::list_experiments(&repo_root),
        Command::Generate {
            experiment_id,
            all: _,
            seed,
            subjects,
            replications,
            workers,
        } => {
            let overrides = Overrides {
                seed,
                subjects,
                replications,
                workers,
            };
            cli::generate(&repo_root, experiment_id.as_deref(), &overrides)
        }
        Command::Report { experiment_id } => cli::report_experiment(&repo_root, &experiment_id),
        Command::Clean { experiment_id } => cli::clean_experiment(&repo_root, &experiment_id),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<PersistError>().is_some() {
        return exit_codes::PERSIST_FAILED;
    }
    match err.downcast_ref::<RunError>() {
        Some(RunError::SubjectFailed { .. }) => exit_codes::SIMULATION_FAILED,
        _ => exit_codes::INVALID,
    }
}
