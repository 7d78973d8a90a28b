use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::signature::Params;
use crate::core::{AppError, Result};

/// Fields the payer's browser carries along that are not part of the signed set
const UNSIGNED_FIELDS: [&str; 2] = ["api_url", "payment_page_url"];

/// Requests a WeChat QR link for a signed FOMO Pay parameter set
#[async_trait]
pub trait QrLinkProvider: Send + Sync {
    async fn qr_link(&self, params: &Params) -> Result<String>;
}

/// Signed fields only, as posted to the QR API
pub fn qr_request_form(params: &Params) -> Params {
    let mut form = params.clone();
    for field in UNSIGNED_FIELDS {
        form.remove(field);
    }
    form
}

/// HTTP client for the FOMO Pay QR API
///
/// The endpoint comes from configuration only; `None` when FOMO Pay is not
/// configured.
pub struct FomopayQrClient {
    client: Client,
    api_url: Option<String>,
}

#[derive(Deserialize)]
struct QrLinkResponse {
    url: Option<String>,
}

impl FomopayQrClient {
    pub fn new(api_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::HttpClient)?;

        Ok(Self { client, api_url })
    }
}

#[async_trait]
impl QrLinkProvider for FomopayQrClient {
    /// Post the signed parameters to the configured API and return the QR link
    async fn qr_link(&self, params: &Params) -> Result<String> {
        let api_url = self
            .api_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("FOMO Pay API URL not configured".to_string()))?;
        let form = qr_request_form(params);

        let response = self
            .client
            .post(api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::from_gateway_call("FOMO Pay", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "FOMO Pay API error {}: {}",
                status, error_body
            )));
        }

        let body: QrLinkResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse FOMO Pay response: {}", e)))?;

        body.url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::gateway("FOMO Pay response did not contain a QR link"))
    }
}
