//! Reconciliation of local and remote record sets.

use crate::conflict::{Conflict, ConflictPolicy, ConflictResolution};
use crate::record::HealthRecord;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Surviving records, newest `date` first.
    pub records: Vec<HealthRecord>,
    /// Number of remote-only records that were added.
    pub inserted: usize,
    /// Records present on both sides with different content.
    pub conflicts: Vec<Conflict>,
}

impl MergeOutcome {
    /// Number of conflicts where the remote version replaced the local one.
    pub fn remote_wins(&self) -> usize {
        self.conflicts.iter().filter(|c| c.accepted_remote()).count()
    }
}

/// Merges a remote record set into a local one.
///
/// 1. Every local record seeds the result (local data is the base).
/// 2. Each remote record is inserted if its id is unknown; otherwise
///    `policy` decides which version survives.
/// 3. The result is sorted by `date` descending, ties by `id` ascending.
///
/// Records that only exist locally are always retained: deletions are not
/// represented. Merging the same remote set into the output a second time
/// yields the same records.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use vitalsync_protocol::{reconcile, ConflictPolicy, HealthRecord};
///
/// let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
/// let local = vec![HealthRecord { weight: 80.0, ..HealthRecord::new("a", day(1)) }];
/// let remote = vec![
///     HealthRecord { weight: 79.5, ..HealthRecord::new("a", day(1)) },
///     HealthRecord::new("b", day(2)),
/// ];
///
/// let outcome = reconcile(&local, &remote, ConflictPolicy::ClientWins);
/// assert_eq!(outcome.records[0].id, "b");
/// assert_eq!(outcome.records[1].weight, 80.0);
/// assert_eq!(outcome.inserted, 1);
/// assert_eq!(outcome.conflicts.len(), 1);
/// ```
pub fn reconcile(
    local: &[HealthRecord],
    remote: &[HealthRecord],
    policy: ConflictPolicy,
) -> MergeOutcome {
    let mut merged: BTreeMap<&str, &HealthRecord> =
        local.iter().map(|record| (record.id.as_str(), record)).collect();
    let mut inserted = 0;
    let mut conflicts = Vec::new();

    for remote_record in remote {
        match merged.entry(remote_record.id.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(remote_record);
                inserted += 1;
            }
            Entry::Occupied(mut slot) => {
                let local_record = *slot.get();
                if local_record == remote_record {
                    continue;
                }

                let resolution = policy.resolve(local_record, remote_record);
                if resolution == ConflictResolution::AcceptRemote {
                    slot.insert(remote_record);
                }
                conflicts.push(Conflict {
                    id: remote_record.id.clone(),
                    local_modified: local_record.last_modified,
                    remote_modified: remote_record.last_modified,
                    resolution,
                });
            }
        }
    }

    // BTreeMap yields ids in ascending order; the stable sort keeps that
    // order among records of the same day.
    let mut records: Vec<HealthRecord> = merged.into_values().cloned().collect();
    records.sort_by(|a, b| b.date.cmp(&a.date));

    MergeOutcome {
        records,
        inserted,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap())
    }

    fn record(id: &str, date: u32, weight: f64, modified: Option<DateTime<Utc>>) -> HealthRecord {
        HealthRecord {
            weight,
            last_modified: modified,
            ..HealthRecord::new(id, day(date))
        }
    }

    #[test]
    fn local_only_records_are_retained() {
        let local = vec![record("a", 1, 80.0, at(1)), record("b", 2, 81.0, at(1))];
        let outcome = reconcile(&local, &[], ConflictPolicy::ServerWins);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.inserted, 0);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn remote_only_records_are_inserted() {
        let remote = vec![record("x", 3, 60.0, at(2))];
        let outcome = reconcile(&[], &remote, ConflictPolicy::ClientWins);

        assert_eq!(outcome.records, remote);
        assert_eq!(outcome.inserted, 1);
    }

    #[test]
    fn server_wins_takes_remote_exactly() {
        let local = vec![record("a", 1, 80.0, at(9))];
        let mut remote_a = record("a", 1, 79.0, at(2));
        remote_a.synced = true;
        remote_a.notes = Some("from phone".into());

        let outcome = reconcile(&local, &[remote_a.clone()], ConflictPolicy::ServerWins);
        assert_eq!(outcome.records, vec![remote_a]);
        assert_eq!(outcome.remote_wins(), 1);
    }

    #[test]
    fn client_wins_keeps_local() {
        let local = vec![record("a", 1, 80.0, at(1))];
        let remote = vec![record("a", 1, 79.0, at(9))];

        let outcome = reconcile(&local, &remote, ConflictPolicy::ClientWins);
        assert_eq!(outcome.records, local);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.remote_wins(), 0);
    }

    #[test]
    fn latest_wins_compares_timestamps() {
        let local = vec![record("a", 1, 80.0, at(5)), record("b", 1, 70.0, at(5))];
        let remote = vec![record("a", 1, 79.0, at(6)), record("b", 1, 71.0, at(5))];

        let outcome = reconcile(&local, &remote, ConflictPolicy::LatestWins);
        let a = outcome.records.iter().find(|r| r.id == "a").unwrap();
        let b = outcome.records.iter().find(|r| r.id == "b").unwrap();
        assert_eq!(a.weight, 79.0);
        assert_eq!(b.weight, 70.0);
    }

    #[test]
    fn identical_versions_are_not_conflicts() {
        let local = vec![record("a", 1, 80.0, at(5))];
        let outcome = reconcile(&local, &local, ConflictPolicy::LatestWins);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.records, local);
    }

    #[test]
    fn output_sorted_newest_first_then_by_id() {
        let local = vec![record("c", 1, 1.0, None), record("b", 5, 1.0, None)];
        let remote = vec![record("a", 5, 1.0, None), record("d", 3, 1.0, None)];

        let outcome = reconcile(&local, &remote, ConflictPolicy::ServerWins);
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn merging_twice_is_a_no_op() {
        let local = vec![record("a", 1, 80.0, at(5)), record("b", 2, 70.0, None)];
        let remote = vec![record("a", 1, 79.0, at(7)), record("c", 3, 65.0, at(1))];

        for policy in ConflictPolicy::ALL {
            let once = reconcile(&local, &remote, policy);
            let twice = reconcile(&once.records, &remote, policy);
            assert_eq!(once.records, twice.records, "policy {policy}");
            assert_eq!(twice.inserted, 0);
        }
    }

    #[test]
    fn duplicate_local_ids_collapse() {
        let local = vec![record("a", 1, 80.0, None), record("a", 1, 81.0, None)];
        let outcome = reconcile(&local, &[], ConflictPolicy::ServerWins);
        assert_eq!(outcome.records.len(), 1);
    }
}
