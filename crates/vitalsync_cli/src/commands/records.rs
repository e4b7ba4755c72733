//! Add and list commands.

use super::{CommandResult, Session};
use chrono::{NaiveDate, Utc};
use clap::Args;
use vitalsync_engine::SyncError;
use vitalsync_protocol::{calculate_bmi, HealthRecord};

/// Measurements for a new record.
#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    /// Day of the observation (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Body weight in kg
    #[arg(long)]
    pub weight: f64,

    /// Fat mass in kg
    #[arg(long, default_value_t = 0.0)]
    pub fat_mass: f64,

    /// Lean mass in kg
    #[arg(long, default_value_t = 0.0)]
    pub lean_mass: f64,

    /// Muscle percentage
    #[arg(long, default_value_t = 0.0)]
    pub muscle: f64,

    /// Bone percentage
    #[arg(long, default_value_t = 0.0)]
    pub bone: f64,

    /// Body water percentage
    #[arg(long, default_value_t = 0.0)]
    pub water: f64,

    /// Hours slept
    #[arg(long, default_value_t = 0.0)]
    pub sleep: f64,

    /// Training hours per week
    #[arg(long, default_value_t = 0.0)]
    pub training: f64,

    /// Height in cm, used to compute the BMI
    #[arg(long, conflicts_with = "bmi")]
    pub height: Option<f64>,

    /// BMI, if already known
    #[arg(long)]
    pub bmi: Option<f64>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}

impl AddArgs {
    /// Builds an unsaved record from the arguments.
    pub fn to_record(&self) -> HealthRecord {
        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        let bmi = self
            .bmi
            .or_else(|| self.height.and_then(|h| calculate_bmi(self.weight, h)))
            .unwrap_or_default();

        HealthRecord {
            weight: self.weight,
            fat_mass: self.fat_mass,
            lean_mass: self.lean_mass,
            muscle_percentage: self.muscle,
            bone_percentage: self.bone,
            water_percentage: self.water,
            sleep_hours: self.sleep,
            training_hours: self.training,
            bmi,
            notes: self.notes.clone(),
            ..HealthRecord::new("", date)
        }
    }
}

/// Saves a record locally, uploading it when online.
pub fn add(session: &Session, args: &AddArgs) -> CommandResult {
    let engine = session.open()?;

    let saved = match engine.save_local(args.to_record()) {
        Ok(saved) => saved,
        Err(SyncError::Validation(violations)) => {
            for violation in &violations {
                eprintln!("✗ {violation}");
            }
            return Err(SyncError::Validation(violations).into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("✓ Saved record {}", saved.id);
    let status = engine.sync_status();
    if status.has_pending_changes {
        println!("  Pending upload (offline)");
    } else {
        println!("  Uploaded");
    }
    Ok(())
}

/// Prints cached records, newest first.
pub fn list(session: &Session, limit: Option<usize>, pending_only: bool, format: &str) -> CommandResult {
    let engine = session.open()?;
    let mut records = engine.get_local_data();
    records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    if pending_only {
        records.retain(HealthRecord::is_pending);
    }
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => print_table(&records),
    }
    Ok(())
}

fn print_table(records: &[HealthRecord]) {
    if records.is_empty() {
        println!("No records");
        return;
    }

    println!(
        "{:<10}  {:>7}  {:>7}  {:>5}  {:>5}  {:<6}  ID",
        "Date", "Weight", "Fat", "BMI", "Sleep", "Synced"
    );
    for record in records {
        println!(
            "{:<10}  {:>7.1}  {:>7.1}  {:>5.1}  {:>5.1}  {:<6}  {}",
            record.date,
            record.weight,
            record.fat_mass,
            record.bmi,
            record.sleep_hours,
            if record.synced { "yes" } else { "no" },
            record.id
        );
    }
}
