use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use spell_binder::client::{
    HttpSyncApi, ImageSyncController, PollPolicy, SyncSnapshot, TriggerOutcome,
};
use spell_binder::models::SyncState;
use spell_binder::telemetry;

/// Follow card image sync progress, optionally starting a run first
#[derive(Debug, Parser)]
#[command(name = "sync-watch", version)]
struct Cli {
    /// Base URL of the API server
    #[arg(long, env = "SPELL_BINDER_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Bearer token; starting a sync needs an admin account
    #[arg(long, env = "SPELL_BINDER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Start a sync before watching
    #[arg(long)]
    trigger: bool,

    /// Seconds between progress polls
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("sync_watch=info,spell_binder=warn");
    let cli = Cli::parse();

    let api = HttpSyncApi::new(&cli.api_url, cli.token.clone())
        .context("Failed to build HTTP client")?;
    let policy = PollPolicy {
        interval: Duration::from_secs(cli.interval_secs),
        ..PollPolicy::default()
    };
    let controller = ImageSyncController::with_policy(Arc::new(api), policy);

    controller
        .refresh_status()
        .await
        .with_context(|| format!("Cannot read sync progress from {}", cli.api_url))?;
    print_snapshot(&controller.snapshot());

    if cli.trigger {
        match controller.trigger_sync().await {
            TriggerOutcome::Started(result) => {
                println!("{}", result.message.as_deref().unwrap_or("Image sync started"));
            }
            TriggerOutcome::Skipped(reason) => println!("Not started: {}", reason),
            TriggerOutcome::Failed(error) => bail!("Image sync was not started: {}", error),
        }
    }

    let mut updates = controller.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            print_snapshot(&snapshot);
        }
    });

    let settled = controller.poll_until_settled().await;
    printer.abort();

    match settled?.map(|progress| progress.status) {
        Some(SyncState::Failed) => bail!("Image sync failed"),
        Some(state) => println!("Image sync finished: {}", state),
        None => println!("No image sync status available"),
    }

    Ok(())
}

fn print_snapshot(snapshot: &SyncSnapshot) {
    if let Some(error) = &snapshot.error {
        eprintln!("error: {}", error);
    }

    let Some(progress) = &snapshot.status else {
        return;
    };

    println!(
        "[{}] {:.2}% complete, {} with images, {} remaining, {} processed in last run",
        progress.status,
        progress.completion_percentage,
        progress.total_with_images,
        progress.total_needing_images,
        progress.records_processed,
    );
}
