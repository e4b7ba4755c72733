//! Backup and restore commands.
//!
//! Backups live in the remote store, so both commands need connectivity.

use super::{CommandResult, Session};
use tracing::info;
use vitalsync_engine::{RemoteStore, SyncError};
use vitalsync_protocol::timestamp;

/// Stores the whole local cache as a remote backup.
pub fn create(session: &Session) -> CommandResult {
    let engine = session.open()?;
    let count = engine.get_local_data().len();

    let id = engine.create_backup()?;

    println!("✓ Backup created successfully");
    println!("  ID: {id}");
    println!("  Records: {count}");
    Ok(())
}

/// Replaces the local cache with a remote backup.
///
/// Refuses when local records are still waiting for upload unless `force`
/// is set, since a restore discards them.
pub fn restore(session: &Session, id: &str, force: bool) -> CommandResult {
    let engine = session.open()?;
    info!("Restoring backup {id}");

    let pending = engine
        .get_local_data()
        .iter()
        .filter(|r| r.is_pending())
        .count();
    if pending > 0 && !force {
        return Err(format!(
            "{pending} local record(s) have not been uploaded. Use --force to discard them."
        )
        .into());
    }

    let restored = engine.restore_from_backup(id)?;

    println!("✓ Backup restored successfully");
    println!("  Records restored: {restored}");
    Ok(())
}

/// Shows a backup's metadata without restoring it.
pub fn show(session: &Session, id: &str) -> CommandResult {
    let engine = session.open()?;
    if !engine.sync_status().is_online {
        return Err(SyncError::NotConnected.into());
    }

    let backup = engine
        .remote()
        .get_backup(&engine.config().backup_collection, id)?
        .ok_or_else(|| SyncError::BackupNotFound(id.to_string()))?;

    println!("Backup Information");
    println!("==================");
    println!("  ID: {}", backup.id);
    println!("  Format version: {}", backup.version);
    println!("  Record count: {}", backup.records.len());
    println!(
        "  Created: {}",
        backup
            .timestamp
            .map(|ts| timestamp::format_timestamp(&ts))
            .unwrap_or_else(|| "unknown".to_string())
    );
    let unsynced = backup.records.iter().filter(|r| r.is_pending()).count();
    if unsynced > 0 {
        println!("  Unsynced records: {unsynced}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::{add, AddArgs};
    use crate::commands::tests::session;
    use crate::commands::Session;

    fn args(weight: f64) -> AddArgs {
        AddArgs {
            date: None,
            weight,
            fat_mass: 0.0,
            lean_mass: 0.0,
            muscle: 0.0,
            bone: 0.0,
            water: 0.0,
            sleep: 0.0,
            training: 0.0,
            height: None,
            bmi: None,
            notes: None,
        }
    }

    #[test]
    fn backup_then_restore() {
        let (_dir, session) = session(false);
        add(&session, &args(80.0)).unwrap();

        let engine = session.open().unwrap();
        let id = engine.create_backup().unwrap();
        drop(engine);

        add(&session, &args(81.0)).unwrap();
        show(&session, &id).unwrap();
        restore(&session, &id, false).unwrap();

        assert_eq!(session.open().unwrap().get_local_data().len(), 1);
    }

    #[test]
    fn restore_refuses_to_discard_pending_records() {
        let (_dir, online) = session(false);
        create(&online).unwrap();

        let offline = Session {
            offline: true,
            ..online.clone()
        };
        add(&offline, &args(80.0)).unwrap();

        let err = restore(&offline, "backup_1", false).unwrap_err();
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn backups_need_connectivity() {
        let (_dir, session) = session(true);
        assert!(create(&session).is_err());
        assert!(show(&session, "backup_1").is_err());
    }
}
