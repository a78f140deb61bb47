//! Tenant roster builder — collects renter candidates and commits each to
//! the backend exactly once.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, FlowError, Result, ValidationError};
use crate::services::{ExtractedRenter, NewTenant, PlatformApi, call_with_timeout};

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

pub(crate) fn phone_re() -> &'static Regex {
    PHONE_RE.get_or_init(|| Regex::new(r"^\+?1?\d{9,15}$").expect("valid phone regex"))
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Pulled out of a confirmed agreement, tagged with the source
    /// document for traceability.
    ExtractedFromDocument { document_id: Uuid },
    ManualEntry,
}

/// A tenant to be added to the household.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenterCandidate {
    pub id: Uuid,
    pub origin: CandidateOrigin,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_primary: bool,
    /// True once the backend tenant-creation call succeeded. A committed
    /// candidate is never resubmitted.
    pub committed: bool,
}

impl RenterCandidate {
    fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            origin: CandidateOrigin::ManualEntry,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: None,
            is_primary: false,
            committed: false,
        }
    }

    fn from_extracted(document_id: Uuid, renter: &ExtractedRenter) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin: CandidateOrigin::ExtractedFromDocument { document_id },
            first_name: renter.first_name.clone(),
            last_name: renter.last_name.clone(),
            email: renter.email.clone().unwrap_or_default(),
            phone_number: renter.phone_number.clone(),
            is_primary: renter.is_primary,
            committed: false,
        }
    }
}

/// Single-field edit applied to a candidate. Validation is deferred to
/// commit — edits always succeed on an existing candidate.
#[derive(Debug, Clone)]
pub enum CandidateUpdate {
    FirstName(String),
    LastName(String),
    Email(String),
    PhoneNumber(Option<String>),
    IsPrimary(bool),
}

/// Validate a candidate into a tenant-creation request.
///
/// Names and email are required; a blank phone number normalizes to none,
/// a present one must match the backend's accepted pattern.
pub fn validate(
    candidate: &RenterCandidate,
) -> std::result::Result<NewTenant, ValidationError> {
    let first_name = candidate.first_name.trim();
    if first_name.is_empty() {
        return Err(ValidationError::Required {
            field: "first_name",
        });
    }
    let last_name = candidate.last_name.trim();
    if last_name.is_empty() {
        return Err(ValidationError::Required { field: "last_name" });
    }
    let email = candidate.email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required { field: "email" });
    }
    if !email_re().is_match(email) {
        return Err(ValidationError::InvalidEmail { field: "email" });
    }
    let phone_number = match candidate.phone_number.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(phone) if phone_re().is_match(phone) => Some(phone.to_string()),
        Some(_) => {
            return Err(ValidationError::InvalidPhone {
                field: "phone_number",
            });
        }
    };

    Ok(NewTenant {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        phone_number,
    })
}

/// The mutable set of renter candidates for one onboarding session.
pub struct RosterBuilder {
    api: Arc<dyn PlatformApi>,
    timeout: Duration,
    candidates: RwLock<Vec<RenterCandidate>>,
}

impl RosterBuilder {
    pub fn new(api: Arc<dyn PlatformApi>, timeout: Duration) -> Self {
        Self {
            api,
            timeout,
            candidates: RwLock::new(Vec::new()),
        }
    }

    /// Append a blank, editable manual-entry candidate.
    pub async fn add_manual(&self) -> Uuid {
        let candidate = RenterCandidate::blank();
        let id = candidate.id;
        self.candidates.write().await.push(candidate);
        id
    }

    /// Append extraction results for a confirmed document, preserving the
    /// order they appeared in the agreement.
    pub async fn merge_extracted(
        &self,
        document_id: Uuid,
        renters: &[ExtractedRenter],
    ) -> Vec<Uuid> {
        let mut candidates = self.candidates.write().await;
        renters
            .iter()
            .map(|renter| {
                let candidate = RenterCandidate::from_extracted(document_id, renter);
                let id = candidate.id;
                candidates.push(candidate);
                id
            })
            .collect()
    }

    /// Mutate one field of a candidate. No validation at edit time.
    pub async fn update(&self, candidate_id: Uuid, update: CandidateUpdate) -> Result<()> {
        let mut candidates = self.candidates.write().await;
        let candidate = candidates
            .iter_mut()
            .find(|c| c.id == candidate_id)
            .ok_or(FlowError::CandidateNotFound(candidate_id))?;
        match update {
            CandidateUpdate::FirstName(value) => candidate.first_name = value,
            CandidateUpdate::LastName(value) => candidate.last_name = value,
            CandidateUpdate::Email(value) => candidate.email = value,
            CandidateUpdate::PhoneNumber(value) => candidate.phone_number = value,
            CandidateUpdate::IsPrimary(value) => candidate.is_primary = value,
        }
        Ok(())
    }

    /// Delete a candidate regardless of origin or commit state. Removing
    /// a committed candidate does not retract the backend tenant.
    pub async fn remove(&self, candidate_id: Uuid) -> Result<()> {
        let mut candidates = self.candidates.write().await;
        let index = candidates
            .iter()
            .position(|c| c.id == candidate_id)
            .ok_or(FlowError::CandidateNotFound(candidate_id))?;
        candidates.remove(index);
        Ok(())
    }

    /// Drop uncommitted candidates that came out of this document.
    /// Committed ones stay — there is no backend rollback.
    pub async fn purge_uncommitted_for_document(&self, document_id: Uuid) -> usize {
        let mut candidates = self.candidates.write().await;
        let before = candidates.len();
        candidates.retain(|c| {
            if c.committed {
                return true;
            }
            !matches!(
                c.origin,
                CandidateOrigin::ExtractedFromDocument { document_id: d } if d == document_id
            )
        });
        before - candidates.len()
    }

    /// Commit one candidate to the backend. Calling `commit` again on an
    /// already-committed candidate is a no-op success without a backend
    /// call.
    pub async fn commit(&self, household_id: Uuid, candidate_id: Uuid) -> Result<()> {
        let candidate = {
            let candidates = self.candidates.read().await;
            candidates
                .iter()
                .find(|c| c.id == candidate_id)
                .cloned()
                .ok_or(FlowError::CandidateNotFound(candidate_id))?
        };
        if candidate.committed {
            return Ok(());
        }

        let tenant = validate(&candidate)?;
        call_with_timeout(
            "add_tenant",
            self.timeout,
            self.api.add_tenant(household_id, &tenant),
        )
        .await?;

        let mut candidates = self.candidates.write().await;
        if let Some(candidate) = candidates.iter_mut().find(|c| c.id == candidate_id) {
            candidate.committed = true;
        }
        Ok(())
    }

    /// Commit every not-yet-committed candidate in roster order. Stops at
    /// the first failure, reporting which candidate failed; candidates
    /// committed earlier in the batch stay committed.
    pub async fn commit_all(&self, household_id: Uuid) -> Result<usize> {
        let pending: Vec<RenterCandidate> = self
            .candidates
            .read()
            .await
            .iter()
            .filter(|c| !c.committed)
            .cloned()
            .collect();

        let mut committed = 0;
        for candidate in pending {
            self.commit(household_id, candidate.id)
                .await
                .map_err(|source| Error::CommitCandidate {
                    candidate_id: candidate.id,
                    name: format!("{} {}", candidate.first_name, candidate.last_name)
                        .trim()
                        .to_string(),
                    source: Box::new(source),
                })?;
            committed += 1;
        }
        Ok(committed)
    }

    /// Clone of every candidate in roster order.
    pub async fn snapshot(&self) -> Vec<RenterCandidate> {
        self.candidates.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.candidates.read().await.is_empty()
    }

    /// Gate condition for finalizing: a non-empty roster with every
    /// candidate committed.
    pub async fn all_committed(&self) -> bool {
        let candidates = self.candidates.read().await;
        !candidates.is_empty() && candidates.iter().all(|c| c.committed)
    }
}
