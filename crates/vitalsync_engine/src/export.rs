//! JSON and CSV export, JSON import.

use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use vitalsync_protocol::{timestamp, HealthRecord};

/// Column headers of the CSV export.
pub const CSV_HEADERS: [&str; 11] = [
    "Date",
    "Weight (kg)",
    "Fat Mass (kg)",
    "Lean Mass (kg)",
    "Muscle (%)",
    "Bone (%)",
    "Water (%)",
    "Sleep (h)",
    "Training (h)",
    "BMI",
    "Notes",
];

/// Renders records as a pretty-printed JSON array.
pub fn records_to_json(records: &[HealthRecord]) -> SyncResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Renders records as CSV, one row per record, in the given order.
pub fn records_to_csv(records: &[HealthRecord]) -> SyncResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;

    for record in records {
        writer.write_record([
            timestamp::format_date(&record.date),
            record.weight.to_string(),
            record.fat_mass.to_string(),
            record.lean_mass.to_string(),
            record.muscle_percentage.to_string(),
            record.bone_percentage.to_string(),
            record.water_percentage.to_string(),
            record.sleep_hours.to_string(),
            record.training_hours.to_string(),
            record.bmi.to_string(),
            record.notes.clone().unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SyncError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SyncError::Export(e.to_string()))
}

/// Parses an export produced by [`records_to_json`].
///
/// The payload must be a JSON array whose every entry decodes as a record;
/// `id`, `synced` and `lastModified` may be absent. Nothing is returned
/// unless every entry is valid.
pub fn parse_import(text: &str) -> SyncResult<Vec<HealthRecord>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SyncError::InvalidFormat(format!("not valid JSON: {e}")))?;

    let Value::Array(entries) = value else {
        return Err(SyncError::InvalidFormat(
            "expected a JSON array of records".to_string(),
        ));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(SyncError::InvalidFormat(format!(
                    "entry {index} is not an object"
                )));
            }
            serde_json::from_value(entry)
                .map_err(|e| SyncError::InvalidFormat(format!("entry {index}: {e}")))
        })
        .collect()
}
