//! Document intake pipeline — upload, extraction, and review state for
//! tenancy agreement files.
//!
//! Each selected file is driven through its own state machine
//! independently and in parallel; one file's failure never blocks the
//! others.

pub mod model;
pub mod pipeline;

pub use model::{DocumentStatus, ReviewForm, UploadedDocument};
pub use pipeline::DocumentIntake;
