//! Rentdesk onboarding — household onboarding core.
//!
//! Drives the landlord onboarding wizard: household creation, tenancy
//! agreement intake (upload → extraction → operator review), tenancy
//! confirmation, tenant roster commitment, and durable progress across
//! reloads.

pub mod config;
pub mod documents;
pub mod error;
pub mod flow;
pub mod progress;
pub mod roster;
pub mod services;
pub mod tenancy;
