//! Status, push, pull and policy commands.

use super::{CommandResult, Session};
use tracing::info;
use vitalsync_engine::{EngineConfig, RetryConfig};
use vitalsync_protocol::{timestamp, ConflictPolicy, SyncStatus};

/// Prints the sync status.
pub fn status(session: &Session, format: &str) -> CommandResult {
    let engine = session.open()?;
    let status = engine.sync_status();
    let pending = engine.get_local_data().iter().filter(|r| r.is_pending()).count();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        _ => print_status(&status, pending),
    }
    Ok(())
}

fn print_status(status: &SyncStatus, pending: usize) {
    println!("Online:          {}", status.is_online);
    println!(
        "Last sync:       {}",
        status
            .last_sync
            .map(|ts| timestamp::format_timestamp(&ts))
            .unwrap_or_else(|| "never".to_string())
    );
    println!("Pending records: {pending}");
    println!("Policy:          {}", status.conflict_resolution);
}

/// Uploads pending records, retrying transient failures.
pub fn push(session: &Session, retries: u32) -> CommandResult {
    let config = EngineConfig::default()
        .with_auto_sync(false)
        .with_retry(RetryConfig::new(retries.saturating_add(1)));
    let engine = session.open_with(config)?;

    let report = engine.sync_to_cloud_with_retry()?;
    if report.skipped {
        println!("✗ Offline, nothing uploaded");
    } else {
        info!(uploaded = report.uploaded, "push complete");
        println!("✓ Uploaded {} record(s)", report.uploaded);
    }
    Ok(())
}

/// Downloads remote records and merges them into the cache.
pub fn pull(session: &Session) -> CommandResult {
    let engine = session.open()?;
    if !engine.sync_status().is_online {
        println!("✗ Offline, nothing downloaded");
        return Ok(());
    }

    let before = engine.get_local_data().len();
    let records = engine.sync_from_cloud()?;
    let stats = engine.stats();

    println!("✓ Merged remote records");
    println!("  Local records: {} (+{})", records.len(), records.len().saturating_sub(before));
    println!("  Remote wins:   {}", stats.remote_wins);
    println!("  Local wins:    {}", stats.local_wins);
    if stats.documents_rejected > 0 {
        println!("  Rejected:      {}", stats.documents_rejected);
    }
    Ok(())
}

/// Shows or sets the conflict policy.
pub fn policy(session: &Session, policy: Option<ConflictPolicy>) -> CommandResult {
    let engine = session.open()?;
    match policy {
        Some(policy) => {
            engine.set_conflict_resolution(policy);
            println!("✓ Conflict policy set to {policy}");
        }
        None => println!("{}", engine.sync_status().conflict_resolution),
    }
    Ok(())
}
