//! Pre-save validation of health records.

use crate::record::HealthRecord;

/// Accepted range for one measurement.
struct Bound {
    label: &'static str,
    min: f64,
    max: f64,
    unit: &'static str,
}

const WEIGHT: Bound = Bound { label: "weight", min: 30.0, max: 200.0, unit: "kg" };
const FAT_MASS: Bound = Bound { label: "fat mass", min: 0.0, max: 100.0, unit: "kg" };
const LEAN_MASS: Bound = Bound { label: "lean mass", min: 0.0, max: 100.0, unit: "kg" };
const MUSCLE: Bound = Bound { label: "muscle percentage", min: 0.0, max: 100.0, unit: "%" };
const BONE: Bound = Bound { label: "bone percentage", min: 0.0, max: 100.0, unit: "%" };
const WATER: Bound = Bound { label: "water percentage", min: 0.0, max: 100.0, unit: "%" };
const SLEEP: Bound = Bound { label: "sleep hours", min: 0.0, max: 24.0, unit: "h" };
const TRAINING: Bound = Bound { label: "training hours", min: 0.0, max: 50.0, unit: "h per week" };

impl Bound {
    fn check(&self, value: f64, violations: &mut Vec<String>) {
        if !value.is_finite() || value < self.min || value > self.max {
            violations.push(format!(
                "{} must be between {} and {} {} (got {})",
                self.label, self.min, self.max, self.unit, value
            ));
        }
    }
}

/// Validates a record before it is saved.
///
/// Returns one human-readable message per violated range; an empty list
/// means the record is acceptable.
///
/// ```rust
/// use chrono::NaiveDate;
/// use vitalsync_protocol::{validate_record, HealthRecord};
///
/// let record = HealthRecord {
///     weight: 250.0,
///     ..HealthRecord::new("", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
/// };
/// let violations = validate_record(&record);
/// assert_eq!(violations.len(), 1);
/// assert!(violations[0].starts_with("weight"));
/// ```
pub fn validate_record(record: &HealthRecord) -> Vec<String> {
    let mut violations = Vec::new();

    WEIGHT.check(record.weight, &mut violations);
    FAT_MASS.check(record.fat_mass, &mut violations);
    LEAN_MASS.check(record.lean_mass, &mut violations);
    MUSCLE.check(record.muscle_percentage, &mut violations);
    BONE.check(record.bone_percentage, &mut violations);
    WATER.check(record.water_percentage, &mut violations);
    SLEEP.check(record.sleep_hours, &mut violations);
    TRAINING.check(record.training_hours, &mut violations);

    if !record.bmi.is_finite() || record.bmi < 0.0 {
        violations.push(format!("bmi must be a non-negative number (got {})", record.bmi));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn valid() -> HealthRecord {
        HealthRecord {
            weight: 84.6,
            fat_mass: 31.9,
            lean_mass: 49.8,
            muscle_percentage: 55.2,
            bone_percentage: 3.6,
            water_percentage: 42.7,
            sleep_hours: 6.5,
            training_hours: 4.0,
            bmi: 29.3,
            ..HealthRecord::new("", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(validate_record(&valid()).is_empty());
    }

    #[test]
    fn bounds_are_inclusive() {
        let record = HealthRecord {
            weight: 30.0,
            sleep_hours: 24.0,
            training_hours: 0.0,
            ..valid()
        };
        assert!(validate_record(&record).is_empty());
    }

    #[test]
    fn reports_every_violation() {
        let record = HealthRecord {
            weight: 20.0,
            sleep_hours: 25.0,
            training_hours: -1.0,
            water_percentage: f64::NAN,
            ..valid()
        };

        let violations = validate_record(&record);
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| v.starts_with("weight")));
        assert!(violations.iter().any(|v| v.starts_with("sleep hours")));
        assert!(violations.iter().any(|v| v.starts_with("training hours")));
        assert!(violations.iter().any(|v| v.starts_with("water percentage")));
    }
}
