//! Onboarding flow — the top-level wizard state machine.
//!
//! The orchestrator sequences household creation, landlord details,
//! document intake, and tenant commitment into a linear wizard whose step
//! sequence depends on whether the operator is a first-time or returning
//! landlord. Progress is persisted across reloads and cleared on finalize
//! or cancel.

pub mod orchestrator;
pub mod session;
pub mod steps;

pub use orchestrator::{OnboardingStatus, Orchestrator};
pub use session::OnboardingSession;
pub use steps::{OnboardingMode, StepCursor, StepId};
