//! External collaborator ports.
//!
//! The onboarding core never touches the network directly — every backend
//! interaction goes through the [`PlatformApi`] and [`IdentityProvider`]
//! traits so the flow can be driven against mocks in tests. The concrete
//! HTTP implementation lives in [`http`].

pub mod http;

pub use http::HttpPlatformClient;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;

// ── Operator identity ───────────────────────────────────────────────

/// Identity of the authenticated operator (landlord) driving the wizard.
#[derive(Debug, Clone)]
pub struct OperatorIdentity {
    pub actor_id: Uuid,
    /// Opaque bearer credential for backend calls.
    pub bearer: SecretString,
    pub is_onboarded: bool,
    pub household_count: u32,
}

// ── Household ───────────────────────────────────────────────────────

/// A managed property as the backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub id: Uuid,
    pub name: String,
    pub address: String,
}

/// Draft fields for creating a household.
///
/// Accepts either a single address line or detailed components; the
/// components are joined when the line is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdDraft {
    pub name: String,
    pub address: String,
    pub street_address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl HouseholdDraft {
    /// Full address line: the explicit `address` field when set, otherwise
    /// the non-empty components joined with `", "`.
    pub fn full_address(&self) -> String {
        let line = self.address.trim();
        if !line.is_empty() {
            return line.to_string();
        }
        [
            &self.street_address,
            &self.city,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Landlord contact fields collected on the landlord-details step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandlordContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

// ── Documents & extraction ──────────────────────────────────────────

/// A file selected by the operator for upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Processing state the backend reports for an uploaded agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteDocumentStatus {
    Processing,
    Processed,
    Failed,
}

/// An uploaded tenancy agreement as the backend returns it.
///
/// `extracted_terms` is populated when the backend ran extraction inline
/// with the upload (`status == Processed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub status: RemoteDocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_terms: Option<ExtractedTerms>,
}

/// Structured terms pulled out of an agreement by the extraction service.
///
/// Every field is optional — extraction returns null for anything it could
/// not find in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTerms {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent: Option<Decimal>,
    pub deposit: Option<Decimal>,
    #[serde(default)]
    pub renters: Vec<ExtractedRenter>,
}

/// One renter found in an agreement by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRenter {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

// ── Tenancy ─────────────────────────────────────────────────────────

/// Normalized tenancy terms produced by review-form validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenancyTerms {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenancyStatus {
    Active,
    Future,
}

impl TenancyStatus {
    /// `Active` when the tenancy has started as of `today`, else `Future`.
    pub fn for_start_date(start_date: NaiveDate, today: NaiveDate) -> Self {
        if start_date <= today {
            Self::Active
        } else {
            Self::Future
        }
    }
}

/// A committed tenancy as the backend returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenancy {
    pub id: Uuid,
    pub status: TenancyStatus,
}

// ── Tenants ─────────────────────────────────────────────────────────

/// Tenant-creation request scoped to a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTenant {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// A created tenant as the backend returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub email: String,
}

// ── Ports ───────────────────────────────────────────────────────────

/// Unified backend port covering every collaborator the wizard talks to:
/// household, document, tenancy, tenant, and finalization services.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Create a household for the operator.
    async fn create_household(
        &self,
        name: &str,
        address: &str,
    ) -> Result<Household, TransportError>;

    /// Update the operator's own contact details.
    async fn update_landlord_contact(
        &self,
        contact: &LandlordContact,
    ) -> Result<(), TransportError>;

    /// Upload a tenancy agreement. The backend may run extraction inline,
    /// in which case the returned record is already `Processed`.
    async fn upload_document(
        &self,
        household_id: Uuid,
        file: &FileUpload,
    ) -> Result<DocumentRecord, TransportError>;

    /// Trigger extraction for an uploaded agreement.
    async fn request_extraction(
        &self,
        document_id: Uuid,
    ) -> Result<DocumentRecord, TransportError>;

    /// Create (or update) the tenancy for an agreement from reviewed terms.
    async fn confirm_tenancy(
        &self,
        document_id: Uuid,
        terms: &TenancyTerms,
    ) -> Result<Tenancy, TransportError>;

    /// Add a tenant to a household.
    async fn add_tenant(
        &self,
        household_id: Uuid,
        tenant: &NewTenant,
    ) -> Result<Tenant, TransportError>;

    /// Mark the operator's account as onboarded.
    async fn complete_onboarding(&self) -> Result<(), TransportError>;
}

/// Session/identity port.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The operator behind the current session.
    async fn current(&self) -> Result<OperatorIdentity, TransportError>;

    /// Re-fetch the session. Called after finalization so route guards
    /// observe the onboarded flag.
    async fn refresh(&self) -> Result<OperatorIdentity, TransportError>;
}

/// Bound a backend call. The underlying future is dropped on expiry, so
/// the call can never leave the caller pending indefinitely.
pub async fn call_with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout { operation, timeout }),
    }
}
