//! Janitor job: deletes draft consignments left untouched past their TTL.
//!
//! Meant to be run by an external scheduler (cron, Kubernetes CronJob).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use consignment_api::{
    auth::{Actor, Role},
    config, db,
    events::{process_events, EventSender, LogNotifier},
    services::{consignments::ConsignmentService, storage::LocalFileStorage},
};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "purge-drafts", about = "Purge stale draft consignments")]
struct Cli {
    /// Override the configured draft TTL, in hours
    #[arg(long)]
    older_than_hours: Option<i64>,

    /// User recorded on audit rows
    #[arg(long, default_value_t = Uuid::nil())]
    actor_id: Uuid,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let ttl = match cli.older_than_hours {
        Some(hours) if hours > 0 => chrono::Duration::hours(hours),
        Some(hours) => anyhow::bail!("--older-than-hours must be positive, got {}", hours),
        None => cfg.draft_ttl(),
    };

    let db_pool = Arc::new(
        db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to database")?,
    );

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let events = tokio::spawn(process_events(event_rx, Arc::new(LogNotifier)));

    let result = {
        let service = ConsignmentService::new(
            db_pool,
            Arc::new(EventSender::new(event_tx)),
            Arc::new(LocalFileStorage::new(&cfg.document_storage_dir)),
        );
        let actor = Actor::new(cli.actor_id, Role::Admin);
        service
            .purge_stale_drafts(&actor, ttl)
            .await
            .context("purge failed")?
    };
    // The sender is gone with the service, so the event loop drains and exits.
    events.await.context("event processor panicked")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        info!(
            purged = result.purged.len(),
            lines_reconciled = result.lines_reconciled,
            "purge complete"
        );
        for id in &result.purged {
            println!("purged {}", id);
        }
    }

    Ok(())
}
