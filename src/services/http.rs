//! HTTP implementation of the platform port.
//!
//! Talks to the Rentdesk REST backend under `/api/users/onboarding/`.
//! Wire-format details stay in here — callers only see the trait types.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;

use super::{
    DocumentRecord, ExtractedTerms, FileUpload, Household, LandlordContact, NewTenant,
    PlatformApi, RemoteDocumentStatus, Tenancy, TenancyStatus, TenancyTerms, Tenant,
};

/// REST client for the onboarding endpoints.
pub struct HttpPlatformClient {
    base_url: String,
    bearer: SecretString,
    client: reqwest::Client,
}

impl HttpPlatformClient {
    /// Build a client with a per-request timeout. The flow additionally
    /// bounds each call with `call_with_timeout`; this is the transport
    /// backstop for non-tokio callers.
    pub fn new(
        base_url: impl Into<String>,
        bearer: SecretString,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                operation: "client_init",
                reason: e.to_string(),
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            bearer,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request_error(operation: &'static str, err: reqwest::Error) -> TransportError {
        TransportError::Request {
            operation,
            reason: err.to_string(),
        }
    }

    /// Reject non-2xx responses, keeping the body for the error message.
    async fn checked(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            operation,
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode {
                operation,
                reason: e.to_string(),
            })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct HouseholdBody<'a> {
    name: &'a str,
    address: &'a str,
}

#[derive(Deserialize)]
struct AgreementWire {
    id: Uuid,
    status: RemoteDocumentStatus,
    #[serde(default)]
    extracted_data: Option<ExtractedTerms>,
}

impl From<AgreementWire> for DocumentRecord {
    fn from(wire: AgreementWire) -> Self {
        Self {
            id: wire.id,
            status: wire.status,
            extracted_terms: wire.extracted_data,
        }
    }
}

#[derive(Serialize)]
struct ConfirmBody<'a> {
    tenancy_agreement_id: Uuid,
    tenancy_name: &'a str,
    start_date: chrono::NaiveDate,
    end_date: Option<chrono::NaiveDate>,
    monthly_rent: rust_decimal::Decimal,
    deposit: rust_decimal::Decimal,
}

#[derive(Deserialize)]
struct TenancyWire {
    id: Uuid,
    status: TenancyStatus,
}

#[derive(Serialize)]
struct TenantBody<'a> {
    household_id: Uuid,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
}

#[async_trait]
impl PlatformApi for HttpPlatformClient {
    async fn create_household(
        &self,
        name: &str,
        address: &str,
    ) -> Result<Household, TransportError> {
        const OP: &str = "create_household";
        let response = self
            .client
            .post(self.url("/api/users/onboarding/household/"))
            .bearer_auth(self.bearer.expose_secret())
            .json(&HouseholdBody { name, address })
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        let response = Self::checked(OP, response).await?;
        Self::decode(OP, response).await
    }

    async fn update_landlord_contact(
        &self,
        contact: &LandlordContact,
    ) -> Result<(), TransportError> {
        const OP: &str = "update_landlord_contact";
        let response = self
            .client
            .patch(self.url("/api/users/onboarding/landlord/"))
            .bearer_auth(self.bearer.expose_secret())
            .json(contact)
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        Self::checked(OP, response).await?;
        Ok(())
    }

    async fn upload_document(
        &self,
        household_id: Uuid,
        file: &FileUpload,
    ) -> Result<DocumentRecord, TransportError> {
        const OP: &str = "upload_document";
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| TransportError::Request {
                operation: OP,
                reason: format!("invalid content type: {e}"),
            })?;
        let form = multipart::Form::new()
            .text("household_id", household_id.to_string())
            .part("file", part);
        let response = self
            .client
            .post(self.url("/api/users/onboarding/tenancy/upload/"))
            .bearer_auth(self.bearer.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        let response = Self::checked(OP, response).await?;
        let wire: AgreementWire = Self::decode(OP, response).await?;
        Ok(wire.into())
    }

    async fn request_extraction(
        &self,
        document_id: Uuid,
    ) -> Result<DocumentRecord, TransportError> {
        const OP: &str = "request_extraction";
        let path = format!("/api/users/onboarding/tenancy/{document_id}/process/");
        let response = self
            .client
            .post(self.url(&path))
            .bearer_auth(self.bearer.expose_secret())
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        let response = Self::checked(OP, response).await?;
        let wire: AgreementWire = Self::decode(OP, response).await?;
        Ok(wire.into())
    }

    async fn confirm_tenancy(
        &self,
        document_id: Uuid,
        terms: &TenancyTerms,
    ) -> Result<Tenancy, TransportError> {
        const OP: &str = "confirm_tenancy";
        let body = ConfirmBody {
            tenancy_agreement_id: document_id,
            tenancy_name: &terms.name,
            start_date: terms.start_date,
            end_date: terms.end_date,
            monthly_rent: terms.monthly_rent,
            deposit: terms.deposit,
        };
        let response = self
            .client
            .post(self.url("/api/users/onboarding/tenancy/confirm/"))
            .bearer_auth(self.bearer.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        let response = Self::checked(OP, response).await?;
        let wire: TenancyWire = Self::decode(OP, response).await?;
        Ok(Tenancy {
            id: wire.id,
            status: wire.status,
        })
    }

    async fn add_tenant(
        &self,
        household_id: Uuid,
        tenant: &NewTenant,
    ) -> Result<Tenant, TransportError> {
        const OP: &str = "add_tenant";
        let body = TenantBody {
            household_id,
            first_name: &tenant.first_name,
            last_name: &tenant.last_name,
            email: &tenant.email,
            phone_number: tenant.phone_number.as_deref(),
        };
        let response = self
            .client
            .post(self.url("/api/users/onboarding/tenant/add/"))
            .bearer_auth(self.bearer.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        let response = Self::checked(OP, response).await?;
        Self::decode(OP, response).await
    }

    async fn complete_onboarding(&self) -> Result<(), TransportError> {
        const OP: &str = "complete_onboarding";
        let response = self
            .client
            .post(self.url("/api/users/onboarding/complete/"))
            .bearer_auth(self.bearer.expose_secret())
            .send()
            .await
            .map_err(|e| Self::request_error(OP, e))?;
        Self::checked(OP, response).await?;
        Ok(())
    }
}
