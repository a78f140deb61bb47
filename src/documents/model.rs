//! Uploaded-document model — one record per selected file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::{DocumentRecord, ExtractedTerms, RemoteDocumentStatus};

/// Lifecycle of one selected file.
///
/// `Selected → Uploading → {Uploaded | Extracted | Failed}`;
/// `Uploaded → Extracting → {Extracted | Failed}`. Uploading lands directly
/// in `Extracted` when the backend ran extraction inline. `Failed` is
/// terminal for the file and never blocks other files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Selected,
    Uploading,
    Uploaded,
    Extracting,
    Extracted,
    Failed,
}

impl DocumentStatus {
    /// Check if a transition from `self` to `target` is valid. Backward
    /// moves are never valid — a document leaves the session only via
    /// explicit removal.
    pub fn can_transition_to(&self, target: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, target),
            (Selected, Uploading)
                | (Selected, Failed)
                | (Uploading, Uploaded)
                | (Uploading, Extracted)
                | (Uploading, Failed)
                | (Uploaded, Extracting)
                | (Extracting, Extracted)
                | (Extracting, Failed)
        )
    }

    /// Whether the file is done for good (no retry on this record).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether extraction has produced reviewable terms.
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Extracted)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Selected => "selected",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Editable review fields mirroring the extracted terms.
///
/// Raw text — the operator edits these directly; parsing and validation
/// happen at confirmation, not at edit time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewForm {
    pub tenancy_name: String,
    pub start_date: String,
    pub end_date: String,
    pub monthly_rent: String,
    pub deposit: String,
}

impl ReviewForm {
    /// Pre-seed from extraction. The tenancy name stays blank — extraction
    /// never produces one, the operator supplies it.
    pub fn seeded_from(terms: &ExtractedTerms) -> Self {
        Self {
            tenancy_name: String::new(),
            start_date: terms
                .start_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            end_date: terms
                .end_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            monthly_rent: terms
                .monthly_rent
                .map(|d| d.to_string())
                .unwrap_or_default(),
            deposit: terms.deposit.map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}

/// One file the operator selected, tracked through upload and extraction.
///
/// `id` is session-local; `backend_id` is set once the upload succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub file_name: String,
    pub backend_id: Option<Uuid>,
    pub status: DocumentStatus,
    /// Human-readable failure reason, set alongside `Failed`.
    pub error: Option<String>,
    pub extracted_terms: Option<ExtractedTerms>,
    pub review_form: ReviewForm,
    pub confirmed: bool,
    pub selected_at: DateTime<Utc>,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            backend_id: None,
            status: DocumentStatus::Selected,
            error: None,
            extracted_terms: None,
            review_form: ReviewForm::default(),
            confirmed: false,
            selected_at: Utc::now(),
        }
    }

    /// Transition to `target`, refusing invalid (backward) moves.
    pub(crate) fn transition(&mut self, target: DocumentStatus) -> bool {
        if self.status.can_transition_to(target) {
            self.status = target;
            true
        } else {
            tracing::warn!(
                document = %self.id,
                "refused document transition {} -> {}",
                self.status,
                target
            );
            false
        }
    }

    /// Mark the document failed with a reason the operator can read.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        if self.transition(DocumentStatus::Failed) {
            self.error = Some(reason.into());
        }
    }

    fn absorb_terms(&mut self, terms: Option<ExtractedTerms>) {
        let terms = terms.unwrap_or_default();
        self.review_form = ReviewForm::seeded_from(&terms);
        self.extracted_terms = Some(terms);
    }

    /// Apply the backend's upload response: either the agreement is still
    /// processing, or extraction ran inline and the terms are ready.
    pub(crate) fn complete_upload(&mut self, record: DocumentRecord) {
        self.backend_id = Some(record.id);
        match record.status {
            RemoteDocumentStatus::Processed => {
                if self.transition(DocumentStatus::Extracted) {
                    self.absorb_terms(record.extracted_terms);
                }
            }
            RemoteDocumentStatus::Processing => {
                self.transition(DocumentStatus::Uploaded);
            }
            RemoteDocumentStatus::Failed => {
                self.fail("The backend could not process this document");
            }
        }
    }

    /// Apply the backend's extraction response.
    pub(crate) fn complete_extraction(&mut self, record: DocumentRecord) {
        match record.status {
            RemoteDocumentStatus::Processed => {
                if self.transition(DocumentStatus::Extracted) {
                    self.absorb_terms(record.extracted_terms);
                }
            }
            RemoteDocumentStatus::Processing => {
                self.fail("Extraction did not complete");
            }
            RemoteDocumentStatus::Failed => {
                self.fail("Extraction failed on the backend");
            }
        }
    }
}
