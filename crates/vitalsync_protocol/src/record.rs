//! Health records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One user-entered body-composition observation.
///
/// `id` is the merge key: reconciliation keeps at most one record per id.
/// Records with `synced == false` are exactly the set the next upload pass
/// pushes. `last_modified` only ever moves forward (see [`HealthRecord::touch`]).
///
/// # Serialized form
///
/// Records are stored and exchanged as camelCase JSON objects. `bmi` is
/// also read from the legacy `imc` key; dates and timestamps accept the
/// lenient shapes documented in [`crate::timestamp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    /// Unique record ID. Empty until the local cache assigns one.
    #[serde(default)]
    pub id: String,
    /// Calendar day the observation pertains to.
    #[serde(with = "crate::timestamp::date")]
    pub date: NaiveDate,
    /// Body weight in kilograms.
    pub weight: f64,
    /// Fat mass in kilograms.
    pub fat_mass: f64,
    /// Lean mass in kilograms.
    pub lean_mass: f64,
    /// Muscle share of body weight, in percent.
    pub muscle_percentage: f64,
    /// Bone share of body weight, in percent.
    pub bone_percentage: f64,
    /// Body water share, in percent.
    pub water_percentage: f64,
    /// Hours slept.
    pub sleep_hours: f64,
    /// Training hours per week.
    pub training_hours: f64,
    /// Body mass index.
    #[serde(alias = "imc")]
    pub bmi: f64,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// True once the remote store has accepted this exact version.
    #[serde(default)]
    pub synced: bool,
    /// Time of the last local or remote mutation.
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<DateTime<Utc>>,
}

impl HealthRecord {
    /// Creates an unsynced record for `date` with every measurement zeroed.
    ///
    /// Intended to be completed with struct update syntax:
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use vitalsync_protocol::HealthRecord;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    /// let record = HealthRecord {
    ///     weight: 80.0,
    ///     ..HealthRecord::new("r1", date)
    /// };
    /// assert!(record.is_pending());
    /// ```
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
            weight: 0.0,
            fat_mass: 0.0,
            lean_mass: 0.0,
            muscle_percentage: 0.0,
            bone_percentage: 0.0,
            water_percentage: 0.0,
            sleep_hours: 0.0,
            training_hours: 0.0,
            bmi: 0.0,
            notes: None,
            synced: false,
            last_modified: None,
        }
    }

    /// Returns true if the record still has to be uploaded.
    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Returns true if the record has not been assigned an ID yet.
    pub fn needs_id(&self) -> bool {
        self.id.trim().is_empty()
    }

    /// Advances `last_modified` to `at`, never moving it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_modified = Some(match self.last_modified {
            Some(current) if current > at => current,
            _ => at,
        });
    }

    /// Marks the record as accepted by the remote store at `server_time`.
    pub fn mark_synced(&mut self, server_time: DateTime<Utc>) {
        self.synced = true;
        self.touch(server_time);
    }
}
