use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};

use super::fulfillment_client::{classify_error, lms_client, FulfillmentClient, FulfillmentFailure};
use crate::config::FulfillmentConfig;
use crate::core::Result;
use crate::modules::orders::models::{Order, OrderLine};

#[derive(Debug, Serialize)]
struct EntitlementRequest<'a> {
    user: &'a str,
    course_uuid: &'a str,
    mode: &'a str,
    order_number: &'a str,
    email_opt_in: bool,
}

#[derive(Debug, Deserialize)]
struct Entitlement {
    uuid: String,
    #[serde(default)]
    order_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EntitlementPage {
    #[serde(default)]
    results: Vec<Entitlement>,
}

impl EntitlementPage {
    /// Uuids of the entitlements granted by one order
    fn issued_for(&self, order_number: &str) -> Vec<&str> {
        self.results
            .iter()
            .filter(|e| e.order_number.as_deref() == Some(order_number))
            .map(|e| e.uuid.as_str())
            .collect()
    }
}

/// Entitlement API client
///
/// A course entitlement line carries the course uuid in `course_id` and the
/// certificate mode in `seat_type`. Revocation looks up the learner's
/// entitlements for the course and deletes those granted by the order.
pub struct EntitlementApiClient {
    client: ClientWithMiddleware,
    api_url: String,
    api_token: String,
    timeout: Duration,
}

impl EntitlementApiClient {
    pub fn new(config: &FulfillmentConfig) -> Result<Self> {
        Ok(Self {
            client: lms_client(config)?,
            api_url: config.entitlement_api_url.clone(),
            api_token: config.api_token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn entitlement_target(line: &OrderLine) -> std::result::Result<(&str, &str), FulfillmentFailure> {
        let course_uuid = line.course_id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
            FulfillmentFailure::Configuration(format!("line {} has no course uuid", line.id))
        })?;
        let mode = line.seat_type.as_deref().filter(|mode| !mode.is_empty()).ok_or_else(|| {
            FulfillmentFailure::Configuration(format!("line {} has no certificate type", line.id))
        })?;
        Ok((course_uuid, mode))
    }

    fn entitlement_url(&self, uuid: &str) -> String {
        format!("{}/{}/", self.api_url.trim_end_matches('/'), uuid)
    }

    fn ensure_token(&self) -> std::result::Result<(), FulfillmentFailure> {
        if self.api_token.is_empty() {
            return Err(FulfillmentFailure::Configuration(
                "entitlement API token is not set".to_string(),
            ));
        }
        Ok(())
    }
}

fn rejected(status: StatusCode, body: &str) -> FulfillmentFailure {
    FulfillmentFailure::Server(format!("{}: {}", status, body))
}

#[async_trait]
impl FulfillmentClient for EntitlementApiClient {
    async fn fulfill_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        let (course_uuid, mode) = Self::entitlement_target(line)?;
        self.ensure_token()?;

        let request = EntitlementRequest {
            user: &order.username,
            course_uuid,
            mode,
            order_number: &order.number,
            email_opt_in: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                order_number = %order.number,
                line_id = line.id,
                status = status.as_u16(),
                "Entitlement API rejected fulfillment"
            );
            return Err(rejected(status, &body));
        }

        let entitlement: Entitlement = response
            .json()
            .await
            .map_err(|e| FulfillmentFailure::Server(format!("unreadable entitlement: {}", e)))?;
        tracing::info!(
            order_number = %order.number,
            line_id = line.id,
            entitlement_uuid = %entitlement.uuid,
            "Granted course entitlement"
        );
        Ok(())
    }

    async fn revoke_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        let (course_uuid, _) = Self::entitlement_target(line)?;
        self.ensure_token()?;

        let response = self
            .client
            .get(&self.api_url)
            .bearer_auth(&self.api_token)
            .timeout(self.timeout)
            .query(&[("user", order.username.as_str()), ("course_uuid", course_uuid)])
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status, &body));
        }
        let page: EntitlementPage = response
            .json()
            .await
            .map_err(|e| FulfillmentFailure::Server(format!("unreadable entitlements: {}", e)))?;

        let issued = page.issued_for(&order.number);
        if issued.is_empty() {
            tracing::info!(line_id = line.id, "No entitlement to revoke");
            return Ok(());
        }

        for uuid in issued {
            let response = self
                .client
                .delete(self.entitlement_url(uuid))
                .bearer_auth(&self.api_token)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(classify_error)?;

            let status = response.status();
            // Already gone
            if status.is_success() || status == StatusCode::NOT_FOUND {
                continue;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status, &body));
        }
        Ok(())
    }
}
