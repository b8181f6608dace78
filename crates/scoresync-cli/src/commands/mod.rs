use std::io;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use scoresync_core::models::Trigger;
use scoresync_core::{AppConfig, Reconciler, SlackClient, SqliteScoreStore};
use serde::Serialize;

use crate::cli::{Commands, ReconcileArgs, RunsArgs, WatchArgs};

mod watch;


use self::watch::run_watch;

#[derive(Debug, Serialize)]
struct InitReport {
    root: String,
    database: String,
    records: usize,
}

pub(crate) fn run_from_root(root: &Path, config_path: Option<&Path>, command: Commands) -> Result<()> {
    let config = AppConfig::load(config_path).context("failed to load configuration")?;
    match command {
        Commands::Init => {
            let report = init_store(root, &config)?;
            print_json(&report)?;
        }
        Commands::Reconcile(args) => {
            let reconciler = open_reconciler(root, config)?;
            run_reconcile(&reconciler, &args)?;
        }
        Commands::Watch(WatchArgs {
            interval_secs,
            max_cycles,
        }) => {
            let reconciler = open_reconciler(root, config)?;
            let report = run_watch(&reconciler, interval_secs, max_cycles);
            print_json(&report)?;
        }
        Commands::Runs(RunsArgs { limit }) => {
            let store = SqliteScoreStore::open(config.database_path(root))
                .context("failed to open score store")?;
            print_json(&store.list_reconcile_runs(limit)?)?;
        }
    }
    Ok(())
}

fn init_store(root: &Path, config: &AppConfig) -> Result<InitReport> {
    let database = config.database_path(root);
    let store = SqliteScoreStore::open(&database).context("failed to open score store")?;
    Ok(InitReport {
        root: root.display().to_string(),
        database: database.display().to_string(),
        records: store.record_count()?,
    })
}

fn open_reconciler(root: &Path, config: AppConfig) -> Result<Reconciler<SlackClient>> {
    let client = SlackClient::new(&config.slack, config.search.page_size)
        .context("failed to create slack client")?;
    Reconciler::open(config, client, root).context("failed to open reconciler")
}

fn run_reconcile<L: scoresync_core::MessageLog>(
    reconciler: &Reconciler<L>,
    args: &ReconcileArgs,
) -> Result<()> {
    let trigger = if args.reminder {
        Trigger::Reminder
    } else {
        Trigger::Command
    };
    let report = reconciler.run(trigger)?;
    if args.text {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}", report.to_text())?;
        stdout.flush()?;
    } else {
        print_json(&report)?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
