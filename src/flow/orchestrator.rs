//! Orchestrator — sequences the wizard steps and owns persistence.
//!
//! Delegates document work to the intake pipeline, confirmation to the
//! tenancy gate, and tenant commitment to the roster builder; it only ever
//! surfaces aggregate gate-condition failures, never per-item transport
//! noise.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::OnboardingConfig;
use crate::documents::DocumentIntake;
use crate::error::{FlowError, Result, ValidationError};
use crate::progress::{ProgressStore, StorageBackend};
use crate::roster::RosterBuilder;
use crate::services::{
    FileUpload, Household, HouseholdDraft, IdentityProvider, LandlordContact, PlatformApi,
    call_with_timeout,
};
use crate::tenancy::TenancyGate;

use super::session::OnboardingSession;
use super::steps::{OnboardingMode, StepId};

/// Aggregate progress snapshot for the presentation layer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OnboardingStatus {
    pub mode: OnboardingMode,
    pub step: StepId,
    pub household_created: bool,
    pub landlord_info_complete: bool,
    pub documents_confirmed: usize,
    pub candidates_total: usize,
    pub candidates_committed: usize,
    pub is_complete: bool,
}

/// Top-level wizard state machine for one operator session.
pub struct Orchestrator {
    api: Arc<dyn PlatformApi>,
    identity: Arc<dyn IdentityProvider>,
    config: OnboardingConfig,
    progress: ProgressStore,
    session: RwLock<OnboardingSession>,
    intake: DocumentIntake,
    gate: TenancyGate,
    roster: RosterBuilder,
    completed: AtomicBool,
}

impl Orchestrator {
    /// Enter the flow: fetch the operator identity, pick the mode from it,
    /// and resume from stored progress when that progress is consistent
    /// with the mode. Inconsistent or absent progress starts fresh.
    pub async fn enter(
        api: Arc<dyn PlatformApi>,
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn StorageBackend>,
        config: OnboardingConfig,
    ) -> Result<Self> {
        let operator =
            call_with_timeout("identity", config.request_timeout, identity.current()).await?;
        let mode = OnboardingMode::for_identity(&operator);
        let progress = ProgressStore::new(storage, operator.actor_id);

        let session = match progress
            .load()
            .await
            .and_then(|snapshot| OnboardingSession::resume(operator.actor_id, mode, snapshot))
        {
            Some(session) => {
                tracing::info!(step = %session.cursor.current(), %mode, "resuming onboarding");
                session
            }
            None => {
                tracing::info!(%mode, "starting onboarding");
                OnboardingSession::new(operator.actor_id, mode)
            }
        };

        let intake = DocumentIntake::new(Arc::clone(&api), config.clone());
        let gate = TenancyGate::new(Arc::clone(&api), config.request_timeout);
        let roster = RosterBuilder::new(Arc::clone(&api), config.request_timeout);

        Ok(Self {
            api,
            identity,
            config,
            progress,
            session: RwLock::new(session),
            intake,
            gate,
            roster,
            completed: AtomicBool::new(false),
        })
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub async fn mode(&self) -> OnboardingMode {
        self.session.read().await.mode
    }

    pub async fn current_step(&self) -> StepId {
        self.session.read().await.cursor.current()
    }

    pub async fn household(&self) -> Option<Household> {
        self.session.read().await.household.clone()
    }

    /// Document pipeline, for per-file progress and review-form edits.
    pub fn documents(&self) -> &DocumentIntake {
        &self.intake
    }

    /// Roster builder, for candidate edits.
    pub fn roster(&self) -> &RosterBuilder {
        &self.roster
    }

    // ── Form drafts ─────────────────────────────────────────────────

    pub async fn edit_household_draft(&self, edit: impl FnOnce(&mut HouseholdDraft)) {
        let mut session = self.session.write().await;
        edit(&mut session.household_draft);
    }

    pub async fn edit_landlord_draft(&self, edit: impl FnOnce(&mut LandlordContact)) {
        let mut session = self.session.write().await;
        edit(&mut session.landlord_draft);
    }

    // ── Step actions ────────────────────────────────────────────────

    /// Create the household from the current draft. Re-entering the step
    /// after a household exists returns it without another backend call.
    pub async fn create_household(&self) -> Result<Household> {
        if let Some(existing) = self.household().await {
            return Ok(existing);
        }
        let (name, address) = {
            let session = self.session.read().await;
            (
                session.household_draft.name.trim().to_string(),
                session.household_draft.full_address(),
            )
        };
        if name.is_empty() {
            return Err(ValidationError::Required { field: "name" }.into());
        }
        if address.is_empty() {
            return Err(ValidationError::Required { field: "address" }.into());
        }

        let household = call_with_timeout(
            "create_household",
            self.config.request_timeout,
            self.api.create_household(&name, &address),
        )
        .await?;
        tracing::info!(household = %household.id, "household created");

        self.session.write().await.household = Some(household.clone());
        self.persist().await;
        Ok(household)
    }

    /// Save the landlord's contact details from the current draft.
    pub async fn save_landlord_details(&self) -> Result<()> {
        let contact = {
            let session = self.session.read().await;
            let draft = &session.landlord_draft;
            LandlordContact {
                first_name: draft.first_name.trim().to_string(),
                last_name: draft.last_name.trim().to_string(),
                email: draft.email.trim().to_string(),
                phone_number: draft
                    .phone_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            }
        };
        if contact.first_name.is_empty() {
            return Err(ValidationError::Required { field: "first_name" }.into());
        }
        if contact.last_name.is_empty() {
            return Err(ValidationError::Required { field: "last_name" }.into());
        }
        if let Some(phone) = contact.phone_number.as_deref() {
            if !crate::roster::phone_re().is_match(phone) {
                return Err(ValidationError::InvalidPhone {
                    field: "phone_number",
                }
                .into());
            }
        }

        call_with_timeout(
            "update_landlord_contact",
            self.config.request_timeout,
            self.api.update_landlord_contact(&contact),
        )
        .await?;

        let mut session = self.session.write().await;
        session.landlord_draft = contact;
        session.landlord_saved = true;
        drop(session);
        self.persist().await;
        Ok(())
    }

    /// Start uploading the given files against the session's household.
    pub async fn select_files(&self, files: Vec<FileUpload>) -> Result<Vec<Uuid>> {
        let household_id = self
            .household()
            .await
            .map(|h| h.id)
            .ok_or(FlowError::HouseholdMissing)?;
        Ok(self.intake.select_files(household_id, files).await)
    }

    /// Confirm one reviewed document.
    pub async fn confirm_document(&self, document_id: Uuid) -> Result<()> {
        self.gate.confirm(&self.intake, &self.roster, document_id).await
    }

    /// Confirm every reviewed, unconfirmed document in selection order.
    pub async fn confirm_all_documents(&self) -> Result<usize> {
        self.gate.confirm_all(&self.intake, &self.roster).await
    }

    /// Remove a document and any of its uncommitted extracted candidates.
    pub async fn remove_document(&self, document_id: Uuid) -> Result<()> {
        let removed = self.intake.remove(document_id).await?;
        let purged = self
            .roster
            .purge_uncommitted_for_document(removed.id)
            .await;
        if purged > 0 {
            tracing::debug!(document = %removed.id, purged, "dropped uncommitted candidates");
        }
        Ok(())
    }

    /// Commit one roster candidate against the session's household.
    pub async fn commit_candidate(&self, candidate_id: Uuid) -> Result<()> {
        let household_id = self
            .household()
            .await
            .map(|h| h.id)
            .ok_or(FlowError::HouseholdMissing)?;
        self.roster.commit(household_id, candidate_id).await
    }

    // ── Wizard transitions ──────────────────────────────────────────

    /// Move to the next step, provided the current step's gate condition
    /// holds. Persists progress on success.
    pub async fn advance(&self) -> Result<StepId> {
        let step = self.current_step().await;
        match step {
            StepId::Intro => {}
            StepId::Household => {
                if self.session.read().await.household.is_none() {
                    return Err(FlowError::HouseholdMissing.into());
                }
            }
            StepId::LandlordDetails => {
                if !self.session.read().await.landlord_saved {
                    return Err(FlowError::LandlordDetailsMissing.into());
                }
            }
            StepId::Documents => {
                if !self.gate.satisfied(&self.intake).await {
                    return Err(FlowError::NoConfirmedDocuments.into());
                }
            }
            StepId::Tenants => return Err(FlowError::AtFinalStep.into()),
        }

        let next = self.session.write().await.cursor.advance()?;
        self.persist().await;
        Ok(next)
    }

    /// Move to the previous step. Data already entered is preserved, not
    /// discarded, and the step being left is not re-validated.
    pub async fn back(&self) -> Result<StepId> {
        let previous = self.session.write().await.cursor.back()?;
        self.persist().await;
        Ok(previous)
    }

    /// Persist and yield control without clearing progress — the session
    /// is resumable. First-time operators must complete the flow, so this
    /// is only available when adding another household.
    pub async fn save_and_exit(&self) -> Result<()> {
        if self.mode().await != OnboardingMode::AdditionalHousehold {
            return Err(FlowError::SaveExitUnavailable.into());
        }
        self.persist().await;
        Ok(())
    }

    /// Abandon the wizard: abort in-flight uploads, clear stored progress,
    /// and drop all in-memory state. Entities already committed to the
    /// backend (household, tenancies, tenants) are not rolled back.
    pub async fn cancel(self) {
        self.intake.abort_all().await;
        self.progress.clear().await;
        tracing::info!("onboarding cancelled");
    }

    /// Finish the flow from the terminal step: commit any remaining
    /// candidates, mark the account onboarded (first-time mode only),
    /// clear stored progress, and terminate the session.
    pub async fn finalize(&self) -> Result<()> {
        if self.completed.load(Ordering::SeqCst) {
            return Err(FlowError::AlreadyComplete.into());
        }
        let (step, mode) = {
            let session = self.session.read().await;
            (session.cursor.current(), session.mode)
        };
        if step != StepId::Tenants {
            return Err(FlowError::NotAtFinalStep.into());
        }
        let household_id = self
            .household()
            .await
            .map(|h| h.id)
            .ok_or(FlowError::HouseholdMissing)?;
        if self.roster.is_empty().await {
            return Err(FlowError::EmptyRoster.into());
        }

        self.roster.commit_all(household_id).await?;

        if mode == OnboardingMode::FirstTime {
            call_with_timeout(
                "complete_onboarding",
                self.config.request_timeout,
                self.api.complete_onboarding(),
            )
            .await?;
            // Refresh so route guards observe the onboarded flag. The
            // account is already onboarded at this point, so a refresh
            // failure must not unwind the finalize.
            if let Err(e) = self.identity.refresh().await {
                tracing::warn!("session refresh after onboarding failed: {e}");
            }
        }

        self.progress.clear().await;
        self.completed.store(true, Ordering::SeqCst);
        tracing::info!(%mode, "onboarding finalized");
        Ok(())
    }

    // ── Introspection ───────────────────────────────────────────────

    pub async fn status(&self) -> OnboardingStatus {
        let session = self.session.read().await;
        let candidates = self.roster.snapshot().await;
        OnboardingStatus {
            mode: session.mode,
            step: session.cursor.current(),
            household_created: session.household.is_some(),
            landlord_info_complete: session.landlord_saved,
            documents_confirmed: self.intake.confirmed_count().await,
            candidates_total: candidates.len(),
            candidates_committed: candidates.iter().filter(|c| c.committed).count(),
            is_complete: self.completed.load(Ordering::SeqCst),
        }
    }

    async fn persist(&self) {
        let snapshot = {
            let mut session = self.session.write().await;
            session.last_persisted_at = Some(Utc::now());
            session.snapshot()
        };
        self.progress.save(&snapshot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryStorage;
    use crate::services::testing::{StubApi, StubIdentity};

    struct Harness {
        api: Arc<StubApi>,
        identity: Arc<StubIdentity>,
        storage: Arc<MemoryStorage>,
    }

    impl Harness {
        fn new(api: StubApi, identity: StubIdentity) -> Self {
            Self {
                api: Arc::new(api),
                identity: Arc::new(identity),
                storage: Arc::new(MemoryStorage::default()),
            }
        }

        async fn enter(&self) -> Orchestrator {
            Orchestrator::enter(
                Arc::clone(&self.api) as Arc<dyn PlatformApi>,
                Arc::clone(&self.identity) as Arc<dyn IdentityProvider>,
                Arc::clone(&self.storage) as Arc<dyn StorageBackend>,
                OnboardingConfig::default(),
            )
            .await
            .unwrap()
        }
    }

    #[tokio::test]
    async fn first_time_operator_starts_at_household() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        assert_eq!(flow.mode().await, OnboardingMode::FirstTime);
        assert_eq!(flow.current_step().await, StepId::Household);
    }

    #[tokio::test]
    async fn returning_operator_starts_at_intro() {
        let harness = Harness::new(StubApi::default(), StubIdentity::returning());
        let flow = harness.enter().await;
        assert_eq!(flow.mode().await, OnboardingMode::AdditionalHousehold);
        assert_eq!(flow.current_step().await, StepId::Intro);
    }

    #[tokio::test]
    async fn household_step_gates_on_creation() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;

        let err = flow.advance().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Flow(FlowError::HouseholdMissing)
        ));

        flow.edit_household_draft(|d| {
            d.name = "Main St".into();
            d.street_address = "1 Main St".into();
            d.city = "Metropolis".into();
            d.postal_code = "12345".into();
            d.country = "Oceania".into();
        })
        .await;
        let household = flow.create_household().await.unwrap();
        assert_eq!(household.address, "1 Main St, Metropolis, 12345, Oceania");

        assert_eq!(flow.advance().await.unwrap(), StepId::LandlordDetails);
    }

    #[tokio::test]
    async fn create_household_requires_name_and_address() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;

        let err = flow.create_household().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Validation(ValidationError::Required { field: "name" })
        ));

        flow.edit_household_draft(|d| d.name = "Main St".into()).await;
        let err = flow.create_household().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Validation(ValidationError::Required { field: "address" })
        ));
    }

    #[tokio::test]
    async fn create_household_is_idempotent_within_the_session() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        flow.edit_household_draft(|d| {
            d.name = "Main St".into();
            d.address = "1 Main St".into();
        })
        .await;

        let first = flow.create_household().await.unwrap();
        let second = flow.create_household().await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn progress_is_persisted_and_resumed() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        {
            let flow = harness.enter().await;
            flow.edit_household_draft(|d| {
                d.name = "Main St".into();
                d.address = "1 Main St".into();
            })
            .await;
            flow.create_household().await.unwrap();
            flow.advance().await.unwrap();
            // Dropped without finalize or cancel — a page reload.
        }

        let flow = harness.enter().await;
        assert_eq!(flow.current_step().await, StepId::LandlordDetails);
        assert!(flow.household().await.is_some());
    }

    #[tokio::test]
    async fn back_never_revalidates() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        flow.edit_household_draft(|d| {
            d.name = "Main St".into();
            d.address = "1 Main St".into();
        })
        .await;
        flow.create_household().await.unwrap();
        flow.advance().await.unwrap();

        assert_eq!(flow.back().await.unwrap(), StepId::Household);
        // Draft survives the back navigation.
        let draft_name = {
            let mut name = String::new();
            flow.edit_household_draft(|d| name = d.name.clone()).await;
            name
        };
        assert_eq!(draft_name, "Main St");

        let err = flow.back().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Flow(FlowError::AtFirstStep)
        ));
    }

    #[tokio::test]
    async fn landlord_phone_must_match_the_accepted_pattern() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        flow.edit_landlord_draft(|d| {
            d.first_name = "Ada".into();
            d.last_name = "Landlord".into();
            d.phone_number = Some("call me maybe".into());
        })
        .await;

        let err = flow.save_landlord_details().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Validation(ValidationError::InvalidPhone { .. })
        ));

        flow.edit_landlord_draft(|d| d.phone_number = Some("+31612345678".into()))
            .await;
        flow.save_landlord_details().await.unwrap();
    }

    #[tokio::test]
    async fn save_and_exit_is_mode_gated() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        let err = flow.save_and_exit().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Flow(FlowError::SaveExitUnavailable)
        ));

        let harness = Harness::new(StubApi::default(), StubIdentity::returning());
        let flow = harness.enter().await;
        flow.save_and_exit().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_clears_stored_progress() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        flow.edit_household_draft(|d| {
            d.name = "Main St".into();
            d.address = "1 Main St".into();
        })
        .await;
        flow.create_household().await.unwrap();
        flow.advance().await.unwrap();
        flow.cancel().await;

        // A fresh entry starts over: nothing to resume.
        let flow = harness.enter().await;
        assert_eq!(flow.current_step().await, StepId::Household);
        assert!(flow.household().await.is_none());
    }

    #[tokio::test]
    async fn finalize_requires_the_terminal_step() {
        let harness = Harness::new(StubApi::default(), StubIdentity::first_time());
        let flow = harness.enter().await;
        let err = flow.finalize().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Flow(FlowError::NotAtFinalStep)
        ));
    }
}
