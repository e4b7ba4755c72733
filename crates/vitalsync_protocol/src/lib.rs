//! # VitalSync Protocol
//!
//! Data model and reconciliation rules shared by every VitalSync component.
//!
//! This crate provides:
//! - [`HealthRecord`], one dated body-composition observation
//! - [`SyncStatus`], the persisted connectivity and sync posture
//! - [`ConflictPolicy`] and [`reconcile`] for merging local and remote copies
//! - [`RemoteDocument`] plus a strict decoder at the remote-store boundary
//! - Pre-save validation and derived metrics (BMI, streaks)
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod document;
mod error;
mod merge;
mod metrics;
mod record;
mod status;
pub mod timestamp;
mod validation;

pub use conflict::{Conflict, ConflictPolicy, ConflictResolution};
pub use document::{
    decode_documents, Backup, RemoteDocument, BACKUP_FORMAT_VERSION, LAST_MODIFIED_FIELD,
};
pub use error::{ProtocolError, ProtocolResult};
pub use merge::{reconcile, MergeOutcome};
pub use metrics::{calculate_bmi, calculate_progress, calculate_streak};
pub use record::HealthRecord;
pub use status::SyncStatus;
pub use validation::validate_record;
