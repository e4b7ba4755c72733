//! Derived metrics over health records.

use crate::record::HealthRecord;
use chrono::NaiveDate;

/// Computes the body mass index, rounded to one decimal.
///
/// Returns `None` for a non-positive height.
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if height_cm <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    Some((weight_kg / (height_m * height_m) * 10.0).round() / 10.0)
}

/// Progress from `initial` towards `target`, in percent, clamped to 0–100.
pub fn calculate_progress(current: f64, target: f64, initial: f64) -> f64 {
    if initial == target {
        return 100.0;
    }
    ((initial - current) / (initial - target) * 100.0).clamp(0.0, 100.0)
}

/// Counts consecutive days with at least one record, starting from the
/// most recent entry and walking backwards.
pub fn calculate_streak(records: &[HealthRecord]) -> u32 {
    let mut dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let Some(first) = dates.first() else {
        return 0;
    };

    let mut streak = 1;
    let mut current = *first;
    for date in dates.iter().skip(1) {
        if current.signed_duration_since(*date).num_days() == 1 {
            streak += 1;
            current = *date;
        } else {
            break;
        }
    }

    streak
}
