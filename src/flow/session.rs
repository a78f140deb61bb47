//! Session aggregate — one operator's in-flight onboarding state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::progress::ProgressSnapshot;
use crate::services::{Household, HouseholdDraft, LandlordContact};

use super::steps::{OnboardingMode, StepCursor, StepId};

/// Process-scoped aggregate root for the wizard. Created on entry
/// (restored from the progress store when possible), mutated as steps
/// complete, destroyed on finalize or cancel.
#[derive(Debug, Clone)]
pub struct OnboardingSession {
    pub actor_id: Uuid,
    pub mode: OnboardingMode,
    pub cursor: StepCursor,
    /// Backend-created household; the session only keeps what it needs to
    /// resume.
    pub household: Option<Household>,
    pub household_draft: HouseholdDraft,
    pub landlord_draft: LandlordContact,
    pub landlord_saved: bool,
    pub created_at: DateTime<Utc>,
    pub last_persisted_at: Option<DateTime<Utc>>,
}

impl OnboardingSession {
    /// Fresh session at the first step of the mode's sequence.
    pub fn new(actor_id: Uuid, mode: OnboardingMode) -> Self {
        Self {
            actor_id,
            mode,
            cursor: StepCursor::first(mode),
            household: None,
            household_draft: HouseholdDraft::default(),
            landlord_draft: LandlordContact::default(),
            landlord_saved: false,
            created_at: Utc::now(),
            last_persisted_at: None,
        }
    }

    /// Restore from a stored snapshot, or `None` when the snapshot is
    /// inconsistent with the current mode: a step outside the mode's
    /// sequence, or a position past `Household` with no household.
    pub fn resume(actor_id: Uuid, mode: OnboardingMode, snapshot: ProgressSnapshot) -> Option<Self> {
        let cursor = StepCursor::at(mode, snapshot.step)?;
        let household_position = StepCursor::at(mode, StepId::Household)?.position();
        if cursor.position() > household_position && snapshot.household.is_none() {
            return None;
        }
        Some(Self {
            actor_id,
            mode,
            cursor,
            household: snapshot.household,
            household_draft: snapshot.household_draft,
            landlord_draft: snapshot.landlord_draft,
            landlord_saved: snapshot.landlord_saved,
            created_at: snapshot.saved_at,
            last_persisted_at: Some(snapshot.saved_at),
        })
    }

    /// The resumable subset, ready for the progress store.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            step: self.cursor.current(),
            household: self.household.clone(),
            household_draft: self.household_draft.clone(),
            landlord_draft: self.landlord_draft.clone(),
            landlord_saved: self.landlord_saved,
            saved_at: Utc::now(),
        }
    }
}
