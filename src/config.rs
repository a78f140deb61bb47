//! Configuration types.

use std::time::Duration;

/// Onboarding flow configuration.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Bound on every backend call. A call that runs past this fails with
    /// `TransportError::Timeout` instead of pending forever.
    pub request_timeout: Duration,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// Accepted tenancy document extensions (lowercase, with leading dot).
    pub allowed_extensions: Vec<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_upload_bytes: 10 * 1024 * 1024, // 10 MiB
            allowed_extensions: [
                ".pdf", ".jpg", ".jpeg", ".png", ".xlsx", ".xls", ".docx", ".doc",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl OnboardingConfig {
    /// Reason this file would be rejected before upload, if any.
    pub fn upload_rejection(&self, file_name: &str, size: u64) -> Option<String> {
        if size > self.max_upload_bytes {
            return Some(format!(
                "File exceeds the maximum size of {} MB",
                self.max_upload_bytes / 1024 / 1024
            ));
        }
        let lower = file_name.to_lowercase();
        if !self.allowed_extensions.iter().any(|ext| lower.ends_with(ext)) {
            return Some(format!(
                "File type not supported. Allowed types: {}",
                self.allowed_extensions.join(", ")
            ));
        }
        None
    }
}
