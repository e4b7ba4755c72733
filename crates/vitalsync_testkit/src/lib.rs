//! # VitalSync Testkit
//!
//! Test utilities for VitalSync.
//!
//! This crate provides:
//! - Sample data and engine harnesses
//! - Property-based test generators using proptest
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vitalsync_testkit::prelude::*;
//!
//! #[test]
//! fn uploads_sample_data() {
//!     let device = TestEngine::online();
//!     for record in sample_records(start_date()) {
//!         device.engine.save_local(record).unwrap();
//!     }
//!     assert_eq!(device.remote.upsert_count(), 12);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
