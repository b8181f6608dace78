use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod args;


pub use args::{ReconcileArgs, RunsArgs, WatchArgs};

#[derive(Debug, Parser)]
#[command(name = "scoresync")]
#[command(about = "Keep the score database in step with the chat log", version)]
pub struct Cli {
    #[arg(long, default_value = ".scoresync")]
    pub root: PathBuf,

    /// TOML settings file; `SCORESYNC_*` variables override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Init,
    Reconcile(ReconcileArgs),
    Watch(WatchArgs),
    Runs(RunsArgs),
}
