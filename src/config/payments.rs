use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;

/// Payment processor settings
///
/// A processor is only registered when its section is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentsConfig {
    pub fomopay: Option<FomopayConfig>,
    pub payu: Option<PayuConfig>,
}

/// FOMO Pay (WeChat QR) settings
#[derive(Debug, Clone, Deserialize)]
pub struct FomopayConfig {
    /// Merchant code issued by FOMO Pay
    pub merchant: String,
    /// Shared key appended to the signed query string
    pub shared_key: String,
    /// FOMO Pay endpoint that issues QR links
    pub api_url: String,
    /// Local page that renders the QR code
    pub payment_page_url: String,
    /// Merchant notification endpoint
    pub callback_url: String,
    /// Payment type sent to the gateway (e.g. `sale`)
    pub payment_type: String,
    /// Seconds the payer has to scan and pay
    pub payment_timeout_secs: u64,
    /// Budget for outbound calls to the FOMO Pay API
    pub request_timeout_secs: u64,
}

/// PayU Latam web checkout settings
#[derive(Debug, Clone, Deserialize)]
pub struct PayuConfig {
    pub payment_page_url: String,
    pub merchant_id: String,
    pub account_id: String,
    pub api_key: String,
    pub tax: String,
    pub tax_return_base: String,
    /// Set to `1` on sandbox accounts; absent in production
    pub test: Option<String>,
    pub response_url: String,
    pub confirmation_url: String,
}

impl PaymentsConfig {
    pub fn from_env() -> Result<Self> {
        Ok(PaymentsConfig {
            fomopay: FomopayConfig::from_env()?,
            payu: PayuConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(fomopay) = &self.fomopay {
            if fomopay.shared_key.is_empty() {
                return Err(AppError::Configuration(
                    "FOMOPAY_SHARED_KEY must not be empty".to_string(),
                ));
            }
            if fomopay.request_timeout_secs == 0 || fomopay.payment_timeout_secs == 0 {
                return Err(AppError::Configuration(
                    "FOMO Pay timeouts must be greater than 0".to_string(),
                ));
            }
        }

        if let Some(payu) = &self.payu {
            if payu.api_key.is_empty() {
                return Err(AppError::Configuration(
                    "PAYU_API_KEY must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl FomopayConfig {
    /// Loads the FOMO Pay section; `None` when `FOMOPAY_MERCHANT` is unset
    fn from_env() -> Result<Option<Self>> {
        let Ok(merchant) = env::var("FOMOPAY_MERCHANT") else {
            return Ok(None);
        };

        Ok(Some(FomopayConfig {
            merchant,
            shared_key: required("FOMOPAY_SHARED_KEY")?,
            api_url: env::var("FOMOPAY_API_URL")
                .unwrap_or_else(|_| "https://gateway.fomopay.com/api/v1/qr".to_string()),
            payment_page_url: env::var("FOMOPAY_PAYMENT_PAGE_URL")
                .unwrap_or_else(|_| "/payment/fomopay/qr".to_string()),
            callback_url: required("FOMOPAY_CALLBACK_URL")?,
            payment_type: env::var("FOMOPAY_TYPE").unwrap_or_else(|_| "sale".to_string()),
            payment_timeout_secs: env::var("FOMOPAY_PAYMENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .map_err(|_| {
                    AppError::Configuration("Invalid FOMOPAY_PAYMENT_TIMEOUT_SECS".to_string())
                })?,
            request_timeout_secs: env::var("FOMOPAY_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| {
                    AppError::Configuration("Invalid FOMOPAY_REQUEST_TIMEOUT_SECS".to_string())
                })?,
        }))
    }
}

impl PayuConfig {
    /// Loads the PayU section; `None` when `PAYU_MERCHANT_ID` is unset
    fn from_env() -> Result<Option<Self>> {
        let Ok(merchant_id) = env::var("PAYU_MERCHANT_ID") else {
            return Ok(None);
        };

        Ok(Some(PayuConfig {
            payment_page_url: env::var("PAYU_PAYMENT_PAGE_URL").unwrap_or_else(|_| {
                "https://checkout.payulatam.com/ppp-web-gateway-payu/".to_string()
            }),
            merchant_id,
            account_id: required("PAYU_ACCOUNT_ID")?,
            api_key: required("PAYU_API_KEY")?,
            tax: env::var("PAYU_TAX").unwrap_or_else(|_| "0".to_string()),
            tax_return_base: env::var("PAYU_TAX_RETURN_BASE").unwrap_or_else(|_| "0".to_string()),
            test: env::var("PAYU_TEST").ok(),
            response_url: required("PAYU_RESPONSE_URL")?,
            confirmation_url: required("PAYU_CONFIRMATION_URL")?,
        }))
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::Configuration(format!("{} not set", key)))
}
