//! Property-based test generators using proptest.
//!
//! Every record strategy produces values that pass validation, so generated
//! records can go through `save_local` as well as straight into a merge.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use vitalsync_protocol::{calculate_bmi, ConflictPolicy, HealthRecord};

/// Strategy for calendar days between 2020 and roughly 2025.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..2000).prop_map(|offset| {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
        base + Days::new(offset)
    })
}

/// Strategy for millisecond-precision UTC timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800_000i64..1_767_225_600_000).prop_map(|millis| {
        Utc.timestamp_millis_opt(millis)
            .single()
            .expect("timestamp in range")
    })
}

/// A value in `[min, max]` with one decimal.
fn tenths(min: f64, max: f64) -> impl Strategy<Value = f64> {
    let (lo, hi) = ((min * 10.0) as i64, (max * 10.0) as i64);
    (lo..=hi).prop_map(|t| t as f64 / 10.0)
}

/// Strategy for a valid record with the given ID.
pub fn record_with_id(id: String) -> impl Strategy<Value = HealthRecord> {
    (
        date_strategy(),
        tenths(30.0, 200.0),
        tenths(0.0, 100.0),
        tenths(0.0, 100.0),
        (tenths(0.0, 100.0), tenths(0.0, 100.0), tenths(0.0, 100.0)),
        (tenths(0.0, 24.0), tenths(0.0, 50.0)),
        prop::option::of("[a-z ]{1,20}"),
        any::<bool>(),
        prop::option::of(timestamp_strategy()),
    )
        .prop_map(
            move |(
                date,
                weight,
                fat_mass,
                lean_mass,
                (muscle, bone, water),
                (sleep, training),
                notes,
                synced,
                last_modified,
            )| HealthRecord {
                weight,
                fat_mass,
                lean_mass,
                muscle_percentage: muscle,
                bone_percentage: bone,
                water_percentage: water,
                sleep_hours: sleep,
                training_hours: training,
                bmi: calculate_bmi(weight, 170.0).unwrap_or_default(),
                notes,
                synced,
                last_modified,
                ..HealthRecord::new(id.clone(), date)
            },
        )
}

/// Strategy for a valid record whose ID is drawn from `r0..r{pool}`.
///
/// A small pool makes ID collisions between independently generated sets
/// likely, which is what merge properties need.
pub fn record_strategy(pool: usize) -> impl Strategy<Value = HealthRecord> {
    (0..pool.max(1)).prop_flat_map(|n| record_with_id(format!("r{n}")))
}

/// Strategy for a valid record without an ID, as a user would enter it.
pub fn new_record_strategy() -> impl Strategy<Value = HealthRecord> {
    record_with_id(String::new()).prop_map(|mut record| {
        record.synced = false;
        record.last_modified = None;
        record
    })
}

/// Strategy for a record set with unique IDs from a pool of `pool`.
pub fn record_set_strategy(
    pool: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<HealthRecord>> {
    prop::collection::vec(record_strategy(pool), 0..=max_len).prop_map(|records| {
        let mut seen = HashSet::new();
        records
            .into_iter()
            .filter(|record| seen.insert(record.id.clone()))
            .collect()
    })
}

/// Strategy for conflict policies.
pub fn policy_strategy() -> impl Strategy<Value = ConflictPolicy> {
    prop::sample::select(ConflictPolicy::ALL.to_vec())
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
