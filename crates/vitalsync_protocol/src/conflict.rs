//! Conflict detection and resolution.

use crate::error::ProtocolError;
use crate::record::HealthRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A record that exists locally and remotely with different content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Record ID.
    pub id: String,
    /// Local `last_modified`.
    pub local_modified: Option<DateTime<Utc>>,
    /// Remote `last_modified`.
    pub remote_modified: Option<DateTime<Utc>>,
    /// How the conflict was resolved.
    pub resolution: ConflictResolution,
}

impl Conflict {
    /// Returns true if the remote version replaced the local one.
    pub fn accepted_remote(&self) -> bool {
        self.resolution == ConflictResolution::AcceptRemote
    }
}

/// Resolution for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Keep local version.
    KeepLocal,
    /// Accept remote version.
    AcceptRemote,
}

/// Policy for automatic conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Server always wins.
    #[default]
    ServerWins,
    /// Client always wins.
    ClientWins,
    /// The version with the strictly later `last_modified` wins; ties keep local.
    LatestWins,
}

impl ConflictPolicy {
    /// Every policy, in declaration order.
    pub const ALL: [ConflictPolicy; 3] = [
        ConflictPolicy::ServerWins,
        ConflictPolicy::ClientWins,
        ConflictPolicy::LatestWins,
    ];

    /// Decides which version of a record survives.
    ///
    /// A missing `last_modified` counts as the earliest possible instant.
    pub fn resolve(&self, local: &HealthRecord, remote: &HealthRecord) -> ConflictResolution {
        match self {
            ConflictPolicy::ServerWins => ConflictResolution::AcceptRemote,
            ConflictPolicy::ClientWins => ConflictResolution::KeepLocal,
            ConflictPolicy::LatestWins => {
                // Option orders None below every Some.
                if remote.last_modified > local.last_modified {
                    ConflictResolution::AcceptRemote
                } else {
                    ConflictResolution::KeepLocal
                }
            }
        }
    }

    /// Returns the persisted name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::ServerWins => "server-wins",
            ConflictPolicy::ClientWins => "client-wins",
            ConflictPolicy::LatestWins => "latest-wins",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConflictPolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s.trim())
            .ok_or_else(|| ProtocolError::UnknownPolicy(s.to_string()))
    }
}
