//! Error types for the onboarding core.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the onboarding flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    /// A `confirm_all` batch stopped at this document. Documents confirmed
    /// earlier in the batch stay confirmed.
    #[error("Could not confirm {file_name}: {source}")]
    ConfirmDocument {
        document_id: Uuid,
        file_name: String,
        #[source]
        source: Box<Error>,
    },

    /// A `commit_all` batch stopped at this candidate. Candidates committed
    /// earlier in the batch stay committed.
    #[error("Could not commit tenant {name}: {source}")]
    CommitCandidate {
        candidate_id: Uuid,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

/// User-input defects. Field-scoped so the presentation layer can attach
/// the message to the offending input; never propagated past the component
/// that detected it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be a number")]
    NotANumber { field: &'static str },

    #[error("{field} must be a date in YYYY-MM-DD format")]
    NotADate { field: &'static str },

    #[error("{field} is not a valid email address")]
    InvalidEmail { field: &'static str },

    #[error("{field} is not a valid phone number")]
    InvalidPhone { field: &'static str },
}

impl ValidationError {
    /// The input field this error should be rendered next to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required { field }
            | Self::NotANumber { field }
            | Self::NotADate { field }
            | Self::InvalidEmail { field }
            | Self::InvalidPhone { field } => field,
        }
    }
}

/// Backend call failures. Surfaced as a step-level message; the entity the
/// call was made for keeps its last good state so the operator can retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("{operation} request failed: {reason}")]
    Request {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} returned HTTP {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("{operation} response could not be decoded: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

/// Progress store failures. Persistence is best-effort: these are logged
/// and swallowed, never shown to the operator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Storage write failed: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wizard-level failures: gate conditions that do not hold, or operations
/// invoked against entities in the wrong state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Already at the first step")]
    AtFirstStep,

    #[error("Already at the final step")]
    AtFinalStep,

    #[error("Create the household before continuing")]
    HouseholdMissing,

    #[error("Save your contact details before continuing")]
    LandlordDetailsMissing,

    #[error("Confirm at least one tenancy agreement before continuing")]
    NoConfirmedDocuments,

    #[error("Add at least one tenant before finishing")]
    EmptyRoster,

    #[error("Finishing is only available on the final step")]
    NotAtFinalStep,

    #[error("Save and exit is only available when adding another household")]
    SaveExitUnavailable,

    #[error("Onboarding is already complete")]
    AlreadyComplete,

    #[error("Document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("Document {0} has not finished uploading")]
    DocumentNotUploaded(Uuid),

    #[error("Document {0} has no extracted terms to confirm")]
    DocumentNotExtracted(Uuid),

    #[error("Tenant candidate {0} not found")]
    CandidateNotFound(Uuid),
}

/// Result type alias for the onboarding core.
pub type Result<T> = std::result::Result<T, Error>;
