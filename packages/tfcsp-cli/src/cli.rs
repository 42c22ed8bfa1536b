use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tfcsp",
    version,
    about = "Time-frequency CSP decoding with group cluster statistics",
    long_about = "Decode condition contrasts from epoched EEG/MEG trials over a frequency x time\n\
                  grid (CSP + LDA, cross-validated ROC-AUC), then test the group maps with\n\
                  bootstrap confidence intervals and a cluster permutation test."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode every subject and contrast, then run the group analysis
    Decode(DecodeArgs),
    /// Run the group analysis on stored score artifacts
    Group(GroupArgs),
    /// Show the frequency and time windows of a configuration
    Grid(GridArgs),
    /// Validate a run configuration
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct DecodeArgs {
    /// Run configuration (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// Directory holding sub-<id>[_ses-<id>]_epo.json files
    #[arg(long)]
    pub epochs_dir: PathBuf,

    /// Directory receiving score artifacts and group results
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Worker threads (0 = one per logical CPU)
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Subjects to decode (default: configuration, then discovered files)
    #[arg(long, num_args = 1..)]
    pub subjects: Option<Vec<String>>,

    /// Sessions to decode (default: configuration, then none)
    #[arg(long, num_args = 1..)]
    pub sessions: Option<Vec<String>>,

    /// Write the run summary to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct GroupArgs {
    /// Run configuration (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// Directory holding the score artifacts; group results are written here
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Subjects to aggregate (default: configuration, then discovered artifacts)
    #[arg(long, num_args = 1..)]
    pub subjects: Option<Vec<String>>,

    /// Sessions to aggregate (default: configuration, then none)
    #[arg(long, num_args = 1..)]
    pub sessions: Option<Vec<String>>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct GridArgs {
    /// Run configuration (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Run configuration (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
