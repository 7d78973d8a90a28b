use crate::core::order_number::{DEFAULT_ORDER_NUMBER_OFFSET, DEFAULT_ORDER_NUMBER_PREFIX};
use crate::core::{AppError, OrderNumberGenerator, Result};
use serde::Deserialize;
use std::env;

pub mod database;
pub mod payments;
pub mod server;

pub use database::DatabaseConfig;
pub use payments::{FomopayConfig, PaymentsConfig, PayuConfig};
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub orders: OrdersConfig,
    pub payments: PaymentsConfig,
    pub fulfillment: FulfillmentConfig,
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

/// Order number format
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    pub number_prefix: String,
    pub number_offset: u64,
}

impl OrdersConfig {
    pub fn generator(&self) -> OrderNumberGenerator {
        OrderNumberGenerator::new(self.number_prefix.clone(), self.number_offset)
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            number_prefix: DEFAULT_ORDER_NUMBER_PREFIX.to_string(),
            number_offset: DEFAULT_ORDER_NUMBER_OFFSET,
        }
    }
}

/// LMS APIs used to fulfill and revoke seats and course entitlements
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentConfig {
    pub enrollment_api_url: String,
    pub entitlement_api_url: String,
    pub api_token: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

const DEFAULT_PLACEMENT_GRACE_SECS: u64 = 30;

/// Payer-facing pages the callbacks redirect to
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    pub receipt_page_url: String,
    pub payment_error_url: String,
    /// How long an accepted payment without an order is still reported as processing
    pub placement_grace_secs: u64,
}

impl CheckoutConfig {
    /// Receipt page for an order, e.g. `/checkout/receipt/?order_number=EDX-100042`
    pub fn receipt_url(&self, order_number: &str) -> String {
        format!("{}?order_number={}", self.receipt_page_url, order_number)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            receipt_page_url: "/checkout/receipt/".to_string(),
            payment_error_url: "/checkout/error/".to_string(),
            placement_grace_secs: DEFAULT_PLACEMENT_GRACE_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            orders: OrdersConfig {
                number_prefix: env::var("ORDER_NUMBER_PREFIX")
                    .unwrap_or_else(|_| DEFAULT_ORDER_NUMBER_PREFIX.to_string()),
                number_offset: env::var("ORDER_NUMBER_OFFSET")
                    .unwrap_or_else(|_| DEFAULT_ORDER_NUMBER_OFFSET.to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Configuration("Invalid ORDER_NUMBER_OFFSET".to_string())
                    })?,
            },
            payments: PaymentsConfig::from_env()?,
            fulfillment: FulfillmentConfig {
                enrollment_api_url: env::var("ENROLLMENT_API_URL")
                    .unwrap_or_else(|_| "http://localhost:18000/api/enrollment/v1/enrollment".to_string()),
                entitlement_api_url: env::var("ENTITLEMENT_API_URL").unwrap_or_else(|_| {
                    "http://localhost:18000/api/entitlements/v1/entitlements/".to_string()
                }),
                api_token: env::var("ENROLLMENT_API_TOKEN").unwrap_or_default(),
                timeout_secs: env::var("ENROLLMENT_API_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Configuration("Invalid ENROLLMENT_API_TIMEOUT_SECS".to_string())
                    })?,
                max_retries: env::var("ENROLLMENT_API_MAX_RETRIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Configuration("Invalid ENROLLMENT_API_MAX_RETRIES".to_string())
                    })?,
            },
            checkout: CheckoutConfig {
                receipt_page_url: env::var("RECEIPT_PAGE_URL")
                    .unwrap_or_else(|_| "/checkout/receipt/".to_string()),
                payment_error_url: env::var("PAYMENT_ERROR_URL")
                    .unwrap_or_else(|_| "/checkout/error/".to_string()),
                placement_grace_secs: env::var("PLACEMENT_GRACE_SECS")
                    .unwrap_or_else(|_| DEFAULT_PLACEMENT_GRACE_SECS.to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Configuration("Invalid PLACEMENT_GRACE_SECS".to_string())
                    })?,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.orders.number_prefix.is_empty() || self.orders.number_prefix.contains('-') {
            return Err(AppError::Configuration(
                "Order number prefix must be non-empty and must not contain '-'".to_string(),
            ));
        }

        if self.fulfillment.timeout_secs == 0 {
            return Err(AppError::Configuration(
                "Enrollment API timeout must be greater than 0".to_string(),
            ));
        }

        if self.database.acquire_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "Database acquire timeout must be greater than 0".to_string(),
            ));
        }

        self.server.validate()?;
        self.payments.validate()
    }
}
