use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};

use crate::config::FulfillmentConfig;
use crate::core::{AppError, Result};
use crate::modules::baskets::ProductClass;
use crate::modules::orders::models::{LineStatus, Order, OrderLine};

const DEFAULT_MODE: &str = "audit";
const MODE_MISMATCH: &str = "Enrollment mode mismatch";

/// Why a line could not be fulfilled or revoked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FulfillmentFailure {
    #[error("fulfillment misconfigured: {0}")]
    Configuration(String),
    #[error("network problem: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("server rejected request: {0}")]
    Server(String),
}

impl FulfillmentFailure {
    /// Line status recorded for this failure
    pub fn line_status(&self) -> LineStatus {
        match self {
            FulfillmentFailure::Configuration(_) => LineStatus::FulfillmentConfigurationError,
            FulfillmentFailure::Network(_) => LineStatus::FulfillmentNetworkError,
            FulfillmentFailure::Timeout(_) => LineStatus::FulfillmentTimeoutError,
            FulfillmentFailure::Server(_) => LineStatus::FulfillmentServerError,
        }
    }
}

/// Grants and revokes what an order line bought
#[async_trait]
pub trait FulfillmentClient: Send + Sync {
    async fn fulfill_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure>;

    async fn revoke_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure>;
}

#[derive(Debug, Serialize)]
struct EnrollmentRequest<'a> {
    user: &'a str,
    is_active: bool,
    mode: &'a str,
    course_details: CourseDetails<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    enrollment_attributes: Vec<EnrollmentAttribute>,
}

#[derive(Debug, Serialize)]
struct CourseDetails<'a> {
    course_id: &'a str,
}

#[derive(Debug, Serialize)]
struct EnrollmentAttribute {
    namespace: &'static str,
    name: &'static str,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct EnrollmentError {
    #[serde(default)]
    message: Option<String>,
}

/// Enrollment API client with transient-failure retries
pub struct EnrollmentApiClient {
    client: ClientWithMiddleware,
    api_url: String,
    api_token: String,
    timeout: Duration,
}

/// HTTP client for the LMS APIs, retrying transient failures
pub(super) fn lms_client(config: &FulfillmentConfig) -> Result<ClientWithMiddleware> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build LMS client: {}", e)))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
    Ok(ClientBuilder::new(http)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

impl EnrollmentApiClient {
    pub fn new(config: &FulfillmentConfig) -> Result<Self> {
        Ok(Self {
            client: lms_client(config)?,
            api_url: config.enrollment_api_url.clone(),
            api_token: config.api_token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn enrollment_target(line: &OrderLine) -> std::result::Result<(&str, &str), FulfillmentFailure> {
        let course_id = line.course_id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
            FulfillmentFailure::Configuration(format!("line {} has no course id", line.id))
        })?;
        let mode = line
            .seat_type
            .as_deref()
            .filter(|mode| !mode.is_empty())
            .unwrap_or(DEFAULT_MODE);
        Ok((course_id, mode))
    }

    async fn post(
        &self,
        request: &EnrollmentRequest<'_>,
    ) -> std::result::Result<(StatusCode, String), FulfillmentFailure> {
        if self.api_token.is_empty() {
            return Err(FulfillmentFailure::Configuration(
                "enrollment API token is not set".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok((status, String::new()));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<EnrollmentError>(&body)
            .unwrap_or_default()
            .message
            .unwrap_or_else(|| "(No detail provided.)".to_string());
        Ok((status, detail))
    }
}

pub(super) fn classify_error(error: reqwest_middleware::Error) -> FulfillmentFailure {
    match error {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => {
            FulfillmentFailure::Timeout(e.to_string())
        }
        reqwest_middleware::Error::Reqwest(e) if e.is_connect() || e.is_request() => {
            FulfillmentFailure::Network(e.to_string())
        }
        other => FulfillmentFailure::Network(other.to_string()),
    }
}

#[async_trait]
impl FulfillmentClient for EnrollmentApiClient {
    async fn fulfill_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        let (course_id, mode) = Self::enrollment_target(line)?;

        let request = EnrollmentRequest {
            user: &order.username,
            is_active: true,
            mode,
            course_details: CourseDetails { course_id },
            enrollment_attributes: vec![
                EnrollmentAttribute {
                    namespace: "order",
                    name: "order_number",
                    value: order.number.clone(),
                },
                EnrollmentAttribute {
                    namespace: "order",
                    name: "date_placed",
                    value: order.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                },
            ],
        };

        match self.post(&request).await? {
            (status, _) if status.is_success() => Ok(()),
            (status, detail) => {
                tracing::error!(
                    order_number = %order.number,
                    line_id = line.id,
                    status = status.as_u16(),
                    detail = %detail,
                    "Enrollment API rejected fulfillment"
                );
                Err(FulfillmentFailure::Server(format!("{}: {}", status, detail)))
            }
        }
    }

    async fn revoke_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        let (course_id, mode) = Self::enrollment_target(line)?;

        let request = EnrollmentRequest {
            user: &order.username,
            is_active: false,
            mode,
            course_details: CourseDetails { course_id },
            enrollment_attributes: Vec::new(),
        };

        match self.post(&request).await? {
            (status, _) if status.is_success() => Ok(()),
            // Learner is enrolled in another mode; that enrollment stays
            (StatusCode::BAD_REQUEST, detail) if detail.contains(MODE_MISMATCH) => {
                tracing::info!(line_id = line.id, detail = %detail, "Skipping revocation");
                Ok(())
            }
            (status, detail) => Err(FulfillmentFailure::Server(format!("{}: {}", status, detail))),
        }
    }
}

/// Sends each line to the client for its product class
///
/// Enrollment codes and coupons have nothing to grant on the LMS, so they
/// complete without a remote call. Neither can be taken back once issued.
pub struct ProductFulfillment {
    seats: Arc<dyn FulfillmentClient>,
    entitlements: Arc<dyn FulfillmentClient>,
}

impl ProductFulfillment {
    pub fn new(seats: Arc<dyn FulfillmentClient>, entitlements: Arc<dyn FulfillmentClient>) -> Self {
        Self { seats, entitlements }
    }
}

#[async_trait]
impl FulfillmentClient for ProductFulfillment {
    async fn fulfill_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        match line.product_class {
            ProductClass::Seat => self.seats.fulfill_line(order, line).await,
            ProductClass::CourseEntitlement => self.entitlements.fulfill_line(order, line).await,
            ProductClass::EnrollmentCode | ProductClass::Coupon => {
                tracing::info!(
                    order_number = %order.number,
                    line_id = line.id,
                    product_class = %line.product_class,
                    "No remote grant needed"
                );
                Ok(())
            }
        }
    }

    async fn revoke_line(
        &self,
        order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        match line.product_class {
            ProductClass::Seat => self.seats.revoke_line(order, line).await,
            ProductClass::CourseEntitlement => self.entitlements.revoke_line(order, line).await,
            ProductClass::EnrollmentCode | ProductClass::Coupon => {
                Err(FulfillmentFailure::Configuration(format!(
                    "{} lines can not be revoked",
                    line.product_class
                )))
            }
        }
    }
}
