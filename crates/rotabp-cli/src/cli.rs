use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "rotabp - Loopy belief propagation over side-chain rotamer states.",
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
    /// Solve a tabulated rotamer problem and report its free energy.
    Solve(SolveArgs),
}

/// Arguments for the `solve` subcommand.
#[derive(Args, Debug, Default)]
pub struct SolveArgs {
    /// Path to the problem definition in TOML format (elements, edges, unary energies).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub problem: PathBuf,

    /// Path to a solver configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the per-residue energy breakdown to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    // --- Solver Overrides ---
    /// Override the damping factor, in [0, 1).
    #[arg(short, long, value_name = "FLOAT")]
    pub damping: Option<f64>,

    /// Override the maximum number of iterations.
    #[arg(long, value_name = "INT")]
    pub max_iter: Option<usize>,

    /// Override the convergence tolerance on the largest belief change.
    #[arg(short, long, value_name = "FLOAT")]
    pub tol: Option<f64>,

    /// Override the number of iterations between convergence checks.
    #[arg(long, value_name = "INT")]
    pub chunk_size: Option<usize>,

    /// Iterate single-state residues instead of folding them into their neighbours.
    #[arg(long)]
    pub no_fold: bool,
}
