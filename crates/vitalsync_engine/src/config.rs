//! Configuration for the sync engine.

use std::time::Duration;
use vitalsync_protocol::ConflictPolicy;

/// Default local key holding the cached record set.
pub const DEFAULT_RECORDS_KEY: &str = "vitalsync_records";
/// Default local key holding the persisted sync status.
pub const DEFAULT_STATUS_KEY: &str = "vitalsync_sync_status";
/// Default remote collection for health records.
pub const DEFAULT_COLLECTION: &str = "health_records";
/// Default remote collection for backups.
pub const DEFAULT_BACKUP_COLLECTION: &str = "backups";
/// Default cap on documents fetched per download pass or feed snapshot.
pub const DEFAULT_FEED_LIMIT: usize = 100;

/// Configuration for a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local key for the record set.
    pub records_key: String,
    /// Local key for the sync status.
    pub status_key: String,
    /// Remote collection for records.
    pub collection: String,
    /// Remote collection for backups.
    pub backup_collection: String,
    /// Maximum documents per download pass or feed snapshot.
    pub feed_limit: usize,
    /// Policy used until the user picks one.
    pub default_policy: ConflictPolicy,
    /// Upload automatically after local writes and on reconnect.
    pub auto_sync: bool,
    /// Prefix for IDs assigned to imported records.
    pub import_id_prefix: String,
    /// Retry configuration for [`sync_to_cloud_with_retry`](crate::SyncEngine::sync_to_cloud_with_retry).
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// Creates a configuration with the default keys and collections.
    pub fn new() -> Self {
        Self {
            records_key: DEFAULT_RECORDS_KEY.to_string(),
            status_key: DEFAULT_STATUS_KEY.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            backup_collection: DEFAULT_BACKUP_COLLECTION.to_string(),
            feed_limit: DEFAULT_FEED_LIMIT,
            default_policy: ConflictPolicy::ServerWins,
            auto_sync: true,
            import_id_prefix: "imported".to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the local storage keys.
    pub fn with_keys(mut self, records_key: impl Into<String>, status_key: impl Into<String>) -> Self {
        self.records_key = records_key.into();
        self.status_key = status_key.into();
        self
    }

    /// Sets the remote record collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets the remote backup collection.
    pub fn with_backup_collection(mut self, collection: impl Into<String>) -> Self {
        self.backup_collection = collection.into();
        self
    }

    /// Sets the download cap. Zero is raised to one.
    pub fn with_feed_limit(mut self, limit: usize) -> Self {
        self.feed_limit = limit.max(1);
        self
    }

    /// Sets the policy used when no status has been persisted yet.
    pub fn with_default_policy(mut self, policy: ConflictPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Enables or disables automatic uploads.
    pub fn with_auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    /// Sets the prefix for imported record IDs.
    pub fn with_import_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.import_id_prefix = prefix.into();
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, before jitter.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% random jitter.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Returns the delay before `attempt` (0-indexed; attempt 0 never waits).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // A negative or NaN multiplier yields no delay.
        let capped = if base.is_nan() {
            0.0
        } else {
            base.clamp(0.0, self.max_delay.as_secs_f64())
        };

        if self.add_jitter {
            Duration::from_secs_f64(capped + capped * 0.25 * jitter_fraction())
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// A fraction in `[0, 1)` drawn from a v4 UUID's random bits.
fn jitter_fraction() -> f64 {
    (uuid::Uuid::new_v4().as_u128() % 1000) as f64 / 1000.0
}
