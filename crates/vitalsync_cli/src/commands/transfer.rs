//! Export and import commands.

use super::{CommandResult, Session};
use std::fs;
use std::path::Path;
use tracing::info;

/// Writes the cache as JSON or CSV to `output`, or to stdout.
pub fn export(session: &Session, format: &str, output: Option<&Path>) -> CommandResult {
    let engine = session.open()?;
    let text = match format {
        "json" => engine.export_data()?,
        "csv" => engine.export_csv()?,
        other => return Err(format!("unknown export format: {other} (expected json or csv)").into()),
    };

    match output {
        Some(path) => {
            fs::write(path, &text)?;
            info!(path = %path.display(), format, "export written");
            println!("✓ Exported {} record(s) to {:?}", engine.get_local_data().len(), path);
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Imports records from a JSON export file.
pub fn import(session: &Session, input: &Path) -> CommandResult {
    let text = fs::read_to_string(input)?;
    let engine = session.open()?;

    let count = engine.import_data(&text)?;
    println!("✓ Imported {count} record(s) from {:?}", input);
    if engine.sync_status().has_pending_changes {
        println!("  Pending upload");
    }
    Ok(())
}
