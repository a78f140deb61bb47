//! Tenancy confirmation gate — validates and commits reviewed terms before
//! the wizard may leave the documents step.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::documents::{DocumentIntake, ReviewForm};
use crate::error::{Error, FlowError, Result, ValidationError};
use crate::roster::RosterBuilder;
use crate::services::{PlatformApi, TenancyTerms, call_with_timeout};

/// Validate a review form into normalized tenancy terms.
///
/// Name, start date, and monthly rent are required; the end date is
/// optional and the deposit defaults to zero when blank or non-numeric.
pub fn validate(form: &ReviewForm) -> std::result::Result<TenancyTerms, ValidationError> {
    let name = form.tenancy_name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "tenancy_name",
        });
    }

    let start_date = required_date("start_date", &form.start_date)?;
    let end_date = optional_date("end_date", &form.end_date)?;
    let monthly_rent = required_decimal("monthly_rent", &form.monthly_rent)?;
    let deposit = form.deposit.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO);

    Ok(TenancyTerms {
        name: name.to_string(),
        start_date,
        end_date,
        monthly_rent,
        deposit,
    })
}

fn required_date(
    field: &'static str,
    raw: &str,
) -> std::result::Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::Required { field });
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ValidationError::NotADate { field })
}

fn optional_date(
    field: &'static str,
    raw: &str,
) -> std::result::Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ValidationError::NotADate { field })
}

fn required_decimal(
    field: &'static str,
    raw: &str,
) -> std::result::Result<Decimal, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::Required { field });
    }
    raw.parse::<Decimal>()
        .map_err(|_| ValidationError::NotANumber { field })
}

/// Confirms reviewed documents against the tenancy service and merges
/// their extracted renters into the roster.
pub struct TenancyGate {
    api: Arc<dyn PlatformApi>,
    timeout: Duration,
}

impl TenancyGate {
    pub fn new(api: Arc<dyn PlatformApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Confirm one reviewed document: validate its form, submit the
    /// normalized terms, mark it confirmed, and append its extracted
    /// renters to the roster tagged with this document's id.
    ///
    /// On backend failure the document stays unconfirmed and the call can
    /// simply be retried. Confirming an already-confirmed document is a
    /// no-op success.
    pub async fn confirm(
        &self,
        intake: &DocumentIntake,
        roster: &RosterBuilder,
        document_id: Uuid,
    ) -> Result<()> {
        let doc = intake.get(document_id).await?;
        if doc.confirmed {
            return Ok(());
        }
        if !doc.status.is_processed() {
            return Err(FlowError::DocumentNotExtracted(document_id).into());
        }
        let backend_id = doc
            .backend_id
            .ok_or(FlowError::DocumentNotExtracted(document_id))?;

        let terms = validate(&doc.review_form)?;
        call_with_timeout(
            "confirm_tenancy",
            self.timeout,
            self.api.confirm_tenancy(backend_id, &terms),
        )
        .await?;

        intake.mark_confirmed(document_id).await?;
        let renters = doc
            .extracted_terms
            .as_ref()
            .map(|t| t.renters.as_slice())
            .unwrap_or(&[]);
        roster.merge_extracted(document_id, renters).await;
        tracing::info!(document = %document_id, "tenancy confirmed");
        Ok(())
    }

    /// Confirm every extracted, not-yet-confirmed document in selection
    /// order. Stops at the first failure, reporting which document failed;
    /// documents confirmed earlier in the batch stay confirmed, and
    /// documents after the failure are not attempted.
    pub async fn confirm_all(
        &self,
        intake: &DocumentIntake,
        roster: &RosterBuilder,
    ) -> Result<usize> {
        let pending: Vec<(Uuid, String)> = intake
            .snapshot()
            .await
            .iter()
            .filter(|d| d.status.is_processed() && !d.confirmed)
            .map(|d| (d.id, d.file_name.clone()))
            .collect();

        let mut confirmed = 0;
        for (document_id, file_name) in pending {
            self.confirm(intake, roster, document_id)
                .await
                .map_err(|source| Error::ConfirmDocument {
                    document_id,
                    file_name,
                    source: Box::new(source),
                })?;
            confirmed += 1;
        }
        Ok(confirmed)
    }

    /// Gate condition for leaving the documents step: at least one
    /// document confirmed, regardless of how many failed.
    pub async fn satisfied(&self, intake: &DocumentIntake) -> bool {
        intake.confirmed_count().await > 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::OnboardingConfig;
    use crate::roster::CandidateOrigin;
    use crate::services::FileUpload;
    use crate::services::testing::StubApi;

    fn form(name: &str, start: &str, rent: &str) -> ReviewForm {
        ReviewForm {
            tenancy_name: name.into(),
            start_date: start.into(),
            end_date: String::new(),
            monthly_rent: rent.into(),
            deposit: String::new(),
        }
    }

    #[test]
    fn validate_accepts_a_complete_form() {
        let mut f = form("  2025 Lease ", "2025-01-01", "1200");
        f.end_date = "2025-12-31".into();
        f.deposit = "2400".into();
        let terms = validate(&f).unwrap();
        assert_eq!(terms.name, "2025 Lease");
        assert_eq!(terms.monthly_rent, dec!(1200));
        assert_eq!(terms.deposit, dec!(2400));
        assert!(terms.end_date.is_some());
    }

    #[test]
    fn validate_requires_name_start_and_rent() {
        let err = validate(&form("", "2025-01-01", "1200")).unwrap_err();
        assert_eq!(err.field(), "tenancy_name");

        let err = validate(&form("Lease", "", "1200")).unwrap_err();
        assert_eq!(err.field(), "start_date");

        let err = validate(&form("Lease", "2025-01-01", "")).unwrap_err();
        assert_eq!(err.field(), "monthly_rent");

        let err = validate(&form("Lease", "2025-01-01", "a lot")).unwrap_err();
        assert_eq!(err, ValidationError::NotANumber {
            field: "monthly_rent"
        });
    }

    #[test]
    fn validate_defaults_deposit_to_zero() {
        let mut f = form("Lease", "2025-01-01", "1200");
        f.deposit = "not a number".into();
        assert_eq!(validate(&f).unwrap().deposit, Decimal::ZERO);

        f.deposit = "".into();
        assert_eq!(validate(&f).unwrap().deposit, Decimal::ZERO);
    }

    #[test]
    fn validate_rejects_malformed_dates() {
        let err = validate(&form("Lease", "01/01/2025", "1200")).unwrap_err();
        assert_eq!(err, ValidationError::NotADate {
            field: "start_date"
        });

        let mut f = form("Lease", "2025-01-01", "1200");
        f.end_date = "soon".into();
        let err = validate(&f).unwrap_err();
        assert_eq!(err.field(), "end_date");
    }

    fn pdf(name: &str) -> FileUpload {
        FileUpload {
            file_name: name.into(),
            content_type: "application/pdf".into(),
            bytes: vec![0u8; 64],
        }
    }

    /// Intake with `count` extracted documents, plus the gate and roster.
    async fn extracted_setup(
        api: Arc<StubApi>,
        count: usize,
    ) -> (DocumentIntake, TenancyGate, RosterBuilder, Vec<Uuid>) {
        let config = OnboardingConfig::default();
        let intake = DocumentIntake::new(Arc::clone(&api) as Arc<dyn PlatformApi>, config.clone());
        let files = (0..count).map(|i| pdf(&format!("lease-{i}.pdf"))).collect();
        let ids = intake.select_files(Uuid::new_v4(), files).await;
        intake.wait_for_uploads().await;
        let gate = TenancyGate::new(
            Arc::clone(&api) as Arc<dyn PlatformApi>,
            config.request_timeout,
        );
        let roster = RosterBuilder::new(
            Arc::clone(&api) as Arc<dyn PlatformApi>,
            config.request_timeout,
        );
        (intake, gate, roster, ids)
    }

    #[tokio::test]
    async fn confirm_with_blank_name_fails_validation() {
        let api = Arc::new(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let (intake, gate, roster, ids) = extracted_setup(Arc::clone(&api), 1).await;

        let err = gate.confirm(&intake, &roster, ids[0]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Required {
                field: "tenancy_name"
            })
        ));
        assert!(!intake.get(ids[0]).await.unwrap().confirmed);
        assert_eq!(api.confirm_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fixed_name_confirms_and_merges_renters() {
        let api = Arc::new(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let (intake, gate, roster, ids) = extracted_setup(Arc::clone(&api), 1).await;

        intake
            .update_review(ids[0], |f| f.tenancy_name = "2025 Lease".into())
            .await
            .unwrap();
        gate.confirm(&intake, &roster, ids[0]).await.unwrap();

        assert!(intake.get(ids[0]).await.unwrap().confirmed);
        let candidates = roster.snapshot().await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].first_name, "Jo");
        assert_eq!(candidates[0].origin, CandidateOrigin::ExtractedFromDocument {
            document_id: ids[0]
        });

        // The submitted terms carry the reviewed name and extracted rent.
        let sent = api.confirmed_terms.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "2025 Lease");
        assert_eq!(sent[0].monthly_rent, dec!(1200));
    }

    #[tokio::test]
    async fn confirm_is_idempotent_after_success() {
        let api = Arc::new(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let (intake, gate, roster, ids) = extracted_setup(Arc::clone(&api), 1).await;
        intake
            .update_review(ids[0], |f| f.tenancy_name = "Lease".into())
            .await
            .unwrap();

        gate.confirm(&intake, &roster, ids[0]).await.unwrap();
        gate.confirm(&intake, &roster, ids[0]).await.unwrap();

        assert_eq!(api.confirm_calls.load(Ordering::SeqCst), 1);
        // Renters are not merged twice either.
        assert_eq!(roster.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn backend_failure_leaves_document_retryable() {
        let api = Arc::new(StubApi {
            inline_extraction: true,
            fail_confirm: true,
            ..Default::default()
        });
        let (intake, gate, roster, ids) = extracted_setup(Arc::clone(&api), 1).await;
        intake
            .update_review(ids[0], |f| f.tenancy_name = "Lease".into())
            .await
            .unwrap();

        let err = gate.confirm(&intake, &roster, ids[0]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        let doc = intake.get(ids[0]).await.unwrap();
        assert!(!doc.confirmed);
        // The document keeps its last good state for retry.
        assert!(doc.status.is_processed());
        assert!(roster.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn confirm_all_preserves_partial_progress() {
        let api = Arc::new(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let (intake, gate, roster, ids) = extracted_setup(Arc::clone(&api), 3).await;

        // A and C are valid; B's name is left blank.
        intake
            .update_review(ids[0], |f| f.tenancy_name = "Lease A".into())
            .await
            .unwrap();
        intake
            .update_review(ids[2], |f| f.tenancy_name = "Lease C".into())
            .await
            .unwrap();

        let err = gate.confirm_all(&intake, &roster).await.unwrap_err();
        let Error::ConfirmDocument {
            document_id,
            file_name,
            ..
        } = err
        else {
            panic!("expected ConfirmDocument error");
        };
        assert_eq!(document_id, ids[1]);
        assert_eq!(file_name, "lease-1.pdf");

        // A stays confirmed, B and C are untouched.
        assert!(intake.get(ids[0]).await.unwrap().confirmed);
        assert!(!intake.get(ids[1]).await.unwrap().confirmed);
        assert!(!intake.get(ids[2]).await.unwrap().confirmed);
        assert_eq!(api.confirm_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gate_requires_one_confirmed_document() {
        let api = Arc::new(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let (intake, gate, roster, ids) = extracted_setup(Arc::clone(&api), 2).await;
        assert!(!gate.satisfied(&intake).await);

        intake
            .update_review(ids[0], |f| f.tenancy_name = "Lease".into())
            .await
            .unwrap();
        gate.confirm(&intake, &roster, ids[0]).await.unwrap();
        assert!(gate.satisfied(&intake).await);
    }
}
