use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "celldd - Run and inspect link-cell domain decompositions for short-range particle simulations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a random-walk simulation with one worker thread per rank.
    Run(RunArgs),
    /// Print the domain and cell grid every rank would use, without running.
    Grid(GridArgs),
}

/// Options shared by every command that builds a decomposition.
#[derive(Args, Debug, Clone)]
pub struct DecompositionArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the number of ranks. Must match `decomposition.node-grid` if both are given.
    #[arg(short = 'n', long, value_name = "INT")]
    pub ranks: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S cells.skin=0.4
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub decomposition: DecompositionArgs,

    /// Override the number of steps to run.
    #[arg(long, value_name = "INT")]
    pub steps: Option<usize>,

    /// Override the seed for particle placement and displacements.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}

/// Arguments for the `grid` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    #[command(flatten)]
    pub decomposition: DecompositionArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_are_parsed() {
        let cli = Cli::parse_from([
            "celldd", "-vv", "run", "-c", "sim.toml", "-n", "4", "--steps", "20", "-S",
            "cells.skin=0.4", "-S", "run.seed=7",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.decomposition.config, PathBuf::from("sim.toml"));
        assert_eq!(args.decomposition.ranks, Some(4));
        assert_eq!(args.steps, Some(20));
        assert_eq!(args.seed, None);
        assert_eq!(
            args.decomposition.set_values,
            vec!["cells.skin=0.4".to_string(), "run.seed=7".to_string()]
        );
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["celldd", "-q", "-v", "grid", "-c", "sim.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_path_is_required() {
        let result = Cli::try_parse_from(["celldd", "run"]);
        assert!(result.is_err());
    }
}
