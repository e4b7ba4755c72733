//! Summary command: BMI, goal progress and logging streak.

use super::{CommandResult, Session};
use serde::Serialize;
use vitalsync_protocol::{calculate_bmi, calculate_progress, calculate_streak, HealthRecord};

/// Derived figures over the local cache.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Number of cached records.
    pub records: usize,
    /// Most recent weight, if any record exists.
    pub latest_weight: Option<f64>,
    /// BMI of the most recent weight at the given height.
    pub bmi: Option<f64>,
    /// Progress towards the target weight, in percent.
    pub progress: Option<f64>,
    /// Consecutive logged days ending at the latest record.
    pub streak: u32,
}

impl Summary {
    /// Computes the summary. Progress starts from the earliest record.
    pub fn compute(records: &[HealthRecord], height_cm: Option<f64>, target: Option<f64>) -> Self {
        let latest = records
            .iter()
            .max_by(|a, b| a.date.cmp(&b.date).then_with(|| b.id.cmp(&a.id)));
        let earliest = records
            .iter()
            .min_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        let latest_weight = latest.map(|r| r.weight);

        Self {
            records: records.len(),
            latest_weight,
            bmi: latest_weight
                .zip(height_cm)
                .and_then(|(weight, height)| calculate_bmi(weight, height)),
            progress: match (latest, earliest, target) {
                (Some(latest), Some(earliest), Some(target)) => {
                    Some(calculate_progress(latest.weight, target, earliest.weight))
                }
                _ => None,
            },
            streak: calculate_streak(records),
        }
    }
}

/// Prints the summary.
pub fn run(
    session: &Session,
    height_cm: Option<f64>,
    target: Option<f64>,
    format: &str,
) -> CommandResult {
    let engine = session.open()?;
    let summary = Summary::compute(&engine.get_local_data(), height_cm, target);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!("Records:       {}", summary.records);
            if let Some(weight) = summary.latest_weight {
                println!("Latest weight: {weight:.1} kg");
            }
            if let Some(bmi) = summary.bmi {
                println!("BMI:           {bmi:.1}");
            }
            if let Some(progress) = summary.progress {
                println!("Goal progress: {progress:.0}%");
            }
            println!("Streak:        {} day(s)", summary.streak);
        }
    }
    Ok(())
}
