use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "medrec",
    about = "MedRec: append-only ledger of medical record pointers",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Journal file (overrides the configuration)
    #[arg(long, global = true)]
    pub journal: Option<PathBuf>,

    /// Identity submitting records (overrides `[client] caller`)
    #[arg(long, global = true)]
    pub caller: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append a record pointer to a subject's history
    Submit(SubmitArgs),
    /// List every record stored for a subject
    Fetch(FetchArgs),
    /// List subjects that have records
    Subjects,
    /// Verify sequence numbering and hash chains
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct SubmitArgs {
    pub subject: String,
    pub pointer: String,
    /// Time to wait for the submission to be acknowledged
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args)]
pub struct FetchArgs {
    pub subject: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Only verify this subject
    pub subject: Option<String>,
}
