use clap::Args;

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Record the cycle as a scheduled reminder instead of a command.
    #[arg(long, default_value_t = false)]
    pub reminder: bool,
    /// Print the chat-style summary instead of JSON.
    #[arg(long, default_value_t = false)]
    pub text: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long, default_value_t = 3600)]
    pub interval_secs: u64,
    /// Stop after this many cycles; 0 keeps running.
    #[arg(long, default_value_t = 0)]
    pub max_cycles: u32,
}

#[derive(Debug, Args)]
pub struct RunsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}
