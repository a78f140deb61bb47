//! Document intake — drives each file's upload and extraction independently.
//!
//! Every selected file gets its own spawned upload task, so one slow or
//! failing document never holds up the others. Removing a document aborts
//! its in-flight upload instead of merely ignoring the result.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::OnboardingConfig;
use crate::error::{FlowError, Result};
use crate::services::{FileUpload, PlatformApi, call_with_timeout};

use super::model::{DocumentStatus, ReviewForm, UploadedDocument};

/// Per-session document pipeline. Documents are kept in selection order,
/// which is also the processing order for `confirm_all`.
pub struct DocumentIntake {
    api: Arc<dyn PlatformApi>,
    config: OnboardingConfig,
    documents: Arc<RwLock<Vec<UploadedDocument>>>,
    uploads: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl DocumentIntake {
    pub fn new(api: Arc<dyn PlatformApi>, config: OnboardingConfig) -> Self {
        Self {
            api,
            config,
            documents: Arc::new(RwLock::new(Vec::new())),
            uploads: Mutex::new(HashMap::new()),
        }
    }

    /// Register one document per file and start uploading all of them
    /// concurrently. Files are never deduplicated — duplicate names produce
    /// independent documents. Files rejected by the pre-checks (size, type)
    /// fail locally without a backend call.
    pub async fn select_files(&self, household_id: Uuid, files: Vec<FileUpload>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let mut doc = UploadedDocument::new(&file.file_name);
            let id = doc.id;
            ids.push(id);

            if let Some(reason) = self
                .config
                .upload_rejection(&file.file_name, file.bytes.len() as u64)
            {
                doc.fail(reason);
                self.documents.write().await.push(doc);
                continue;
            }

            doc.transition(DocumentStatus::Uploading);
            self.documents.write().await.push(doc);

            let api = Arc::clone(&self.api);
            let documents = Arc::clone(&self.documents);
            let timeout = self.config.request_timeout;
            let handle = tokio::spawn(async move {
                let outcome = call_with_timeout(
                    "upload_document",
                    timeout,
                    api.upload_document(household_id, &file),
                )
                .await;
                let mut docs = documents.write().await;
                // The document may have been removed mid-flight.
                let Some(doc) = docs.iter_mut().find(|d| d.id == id) else {
                    return;
                };
                match outcome {
                    Ok(record) => doc.complete_upload(record),
                    Err(err) => {
                        tracing::warn!(document = %id, "upload failed: {err}");
                        doc.fail(err.to_string());
                    }
                }
            });
            self.uploads.lock().await.insert(id, handle);
        }
        ids
    }

    /// Await every in-flight upload. Aborted tasks are fine to join.
    pub async fn wait_for_uploads(&self) {
        let handles: Vec<_> = {
            let mut uploads = self.uploads.lock().await;
            uploads.drain().map(|(_, handle)| handle).collect()
        };
        futures::future::join_all(handles).await;
    }

    /// Trigger extraction for an uploaded document. Only valid from
    /// `Uploaded`; an already-`Extracted` document is a no-op success.
    /// A backend failure lands the document in `Failed` rather than
    /// propagating — the operator retries by re-selecting the file.
    pub async fn request_extraction(&self, document_id: Uuid) -> Result<()> {
        let backend_id = {
            let mut docs = self.documents.write().await;
            let doc = docs
                .iter_mut()
                .find(|d| d.id == document_id)
                .ok_or(FlowError::DocumentNotFound(document_id))?;
            if doc.status == DocumentStatus::Extracted {
                return Ok(());
            }
            if doc.status != DocumentStatus::Uploaded {
                return Err(FlowError::DocumentNotUploaded(document_id).into());
            }
            let backend_id = doc
                .backend_id
                .ok_or(FlowError::DocumentNotUploaded(document_id))?;
            doc.transition(DocumentStatus::Extracting);
            backend_id
        };

        let outcome = call_with_timeout(
            "request_extraction",
            self.config.request_timeout,
            self.api.request_extraction(backend_id),
        )
        .await;

        let mut docs = self.documents.write().await;
        if let Some(doc) = docs.iter_mut().find(|d| d.id == document_id) {
            match outcome {
                Ok(record) => doc.complete_extraction(record),
                Err(err) => {
                    tracing::warn!(document = %document_id, "extraction failed: {err}");
                    doc.fail(err.to_string());
                }
            }
        }
        Ok(())
    }

    /// Remove a document from the session, aborting its upload if still in
    /// flight. Valid from any state; nothing is cleaned up backend-side.
    pub async fn remove(&self, document_id: Uuid) -> Result<UploadedDocument> {
        if let Some(handle) = self.uploads.lock().await.remove(&document_id) {
            handle.abort();
        }
        let mut docs = self.documents.write().await;
        let index = docs
            .iter()
            .position(|d| d.id == document_id)
            .ok_or(FlowError::DocumentNotFound(document_id))?;
        Ok(docs.remove(index))
    }

    /// Abort every in-flight upload. Used on cancel.
    pub async fn abort_all(&self) {
        for (_, handle) in self.uploads.lock().await.drain() {
            handle.abort();
        }
    }

    /// Apply an operator edit to a document's review form.
    pub async fn update_review(
        &self,
        document_id: Uuid,
        edit: impl FnOnce(&mut ReviewForm),
    ) -> Result<()> {
        let mut docs = self.documents.write().await;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or(FlowError::DocumentNotFound(document_id))?;
        edit(&mut doc.review_form);
        Ok(())
    }

    pub async fn get(&self, document_id: Uuid) -> Result<UploadedDocument> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
            .ok_or_else(|| FlowError::DocumentNotFound(document_id).into())
    }

    /// Clone of every document in selection order.
    pub async fn snapshot(&self) -> Vec<UploadedDocument> {
        self.documents.read().await.clone()
    }

    pub async fn confirmed_count(&self) -> usize {
        self.documents
            .read()
            .await
            .iter()
            .filter(|d| d.confirmed)
            .count()
    }

    /// Mark a document confirmed. Only called after the backend accepted
    /// the tenancy, which upholds the confirmed-implies-backend-id
    /// invariant.
    pub(crate) async fn mark_confirmed(&self, document_id: Uuid) -> Result<()> {
        let mut docs = self.documents.write().await;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or(FlowError::DocumentNotFound(document_id))?;
        doc.confirmed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::services::testing::StubApi;

    fn pdf(name: &str) -> FileUpload {
        FileUpload {
            file_name: name.into(),
            content_type: "application/pdf".into(),
            bytes: vec![0u8; 128],
        }
    }

    fn intake_with(api: StubApi) -> DocumentIntake {
        DocumentIntake::new(Arc::new(api), OnboardingConfig::default())
    }

    #[tokio::test]
    async fn inline_extraction_lands_documents_in_extracted() {
        let intake = intake_with(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let ids = intake
            .select_files(Uuid::new_v4(), vec![pdf("a.pdf"), pdf("b.pdf")])
            .await;
        intake.wait_for_uploads().await;

        let docs = intake.snapshot().await;
        assert_eq!(docs.len(), 2);
        // Selection order is preserved.
        assert_eq!(docs[0].id, ids[0]);
        assert_eq!(docs[1].id, ids[1]);
        for doc in &docs {
            assert_eq!(doc.status, DocumentStatus::Extracted);
            assert_eq!(doc.review_form.monthly_rent, "1200");
        }
    }

    #[tokio::test]
    async fn duplicate_names_produce_independent_documents() {
        let intake = intake_with(StubApi {
            inline_extraction: true,
            ..Default::default()
        });
        let ids = intake
            .select_files(Uuid::new_v4(), vec![pdf("lease.pdf"), pdf("lease.pdf")])
            .await;
        intake.wait_for_uploads().await;

        assert_ne!(ids[0], ids[1]);
        assert_eq!(intake.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn upload_failure_is_per_document() {
        let api = Arc::new(StubApi {
            fail_upload: true,
            ..Default::default()
        });
        let intake = DocumentIntake::new(Arc::clone(&api) as Arc<dyn PlatformApi>, OnboardingConfig::default());
        intake.select_files(Uuid::new_v4(), vec![pdf("a.pdf")]).await;
        intake.wait_for_uploads().await;

        let docs = intake.snapshot().await;
        assert_eq!(docs[0].status, DocumentStatus::Failed);
        assert!(docs[0].error.is_some());
        assert_eq!(api.upload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_file_fails_locally_without_backend_call() {
        let api = Arc::new(StubApi::default());
        let intake = DocumentIntake::new(Arc::clone(&api) as Arc<dyn PlatformApi>, OnboardingConfig::default());
        intake
            .select_files(
                Uuid::new_v4(),
                vec![FileUpload {
                    file_name: "notes.txt".into(),
                    content_type: "text/plain".into(),
                    bytes: vec![0u8; 16],
                }],
            )
            .await;
        intake.wait_for_uploads().await;

        let docs = intake.snapshot().await;
        assert_eq!(docs[0].status, DocumentStatus::Failed);
        assert_eq!(api.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deferred_extraction_flow() {
        let intake = intake_with(StubApi::default());
        let ids = intake.select_files(Uuid::new_v4(), vec![pdf("a.pdf")]).await;
        intake.wait_for_uploads().await;
        assert_eq!(
            intake.get(ids[0]).await.unwrap().status,
            DocumentStatus::Uploaded
        );

        intake.request_extraction(ids[0]).await.unwrap();
        let doc = intake.get(ids[0]).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Extracted);
        assert_eq!(doc.review_form.start_date, "2025-01-01");

        // Re-requesting on an extracted document is a no-op success.
        intake.request_extraction(ids[0]).await.unwrap();
    }

    #[tokio::test]
    async fn extraction_requires_uploaded_state() {
        let intake = intake_with(StubApi {
            upload_delay: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let ids = intake.select_files(Uuid::new_v4(), vec![pdf("a.pdf")]).await;
        // Still Uploading — extraction must refuse.
        let err = intake.request_extraction(ids[0]).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Flow(FlowError::DocumentNotUploaded(_))
        ));
        intake.abort_all().await;
    }

    #[tokio::test]
    async fn extraction_failure_lands_in_failed() {
        let intake = intake_with(StubApi {
            fail_extraction: true,
            ..Default::default()
        });
        let ids = intake.select_files(Uuid::new_v4(), vec![pdf("a.pdf")]).await;
        intake.wait_for_uploads().await;
        intake.request_extraction(ids[0]).await.unwrap();

        let doc = intake.get(ids[0]).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upload_times_out_into_failed() {
        let api = StubApi {
            upload_delay: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        let config = OnboardingConfig {
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let intake = DocumentIntake::new(Arc::new(api), config);
        let ids = intake.select_files(Uuid::new_v4(), vec![pdf("a.pdf")]).await;
        intake.wait_for_uploads().await;

        let doc = intake.get(ids[0]).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn remove_aborts_an_in_flight_upload() {
        let intake = intake_with(StubApi {
            upload_delay: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let ids = intake.select_files(Uuid::new_v4(), vec![pdf("a.pdf")]).await;
        let removed = intake.remove(ids[0]).await.unwrap();
        assert_eq!(removed.id, ids[0]);
        assert!(intake.snapshot().await.is_empty());
        // Joining the aborted task must not hang.
        intake.wait_for_uploads().await;
    }

    #[tokio::test]
    async fn remove_unknown_document_errors() {
        let intake = intake_with(StubApi::default());
        let err = intake.remove(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Flow(FlowError::DocumentNotFound(_))
        ));
    }
}
