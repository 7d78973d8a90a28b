use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::processor::{
    captured_amount, duplicate_check, BasketSnapshot, CreditOutcome, HandledProcessorResponse,
    Notification, PaymentProcessor, ProcessorDecision, TransactionParameters,
};
use super::signature::{SignatureCodec, SortedParamsSha256};
use crate::config::FomopayConfig;
use crate::core::{AppError, Currency, Result};
use crate::modules::baskets::Basket;

pub const FOMOPAY: &str = "fomopay";

/// Label stored on payment sources; WeChat does not expose card details
pub const WECHAT_QR_LABEL: &str = "WeChat QR Payment";

/// FOMO Pay WeChat QR integration
pub struct Fomopay {
    config: FomopayConfig,
    codec: SortedParamsSha256,
}

impl Fomopay {
    pub fn new(config: FomopayConfig) -> Self {
        let codec = SortedParamsSha256::new(config.shared_key.clone());
        Self { config, codec }
    }

    pub fn codec(&self) -> &SortedParamsSha256 {
        &self.codec
    }

    /// `Seat(s) bought in:{course ids}`
    fn basket_description(basket: &Basket) -> String {
        format!("Seat(s) bought in:{}", basket.course_ids().join(","))
    }
}

#[async_trait]
impl PaymentProcessor for Fomopay {
    fn name(&self) -> &'static str {
        FOMOPAY
    }

    fn reference_field(&self) -> &'static str {
        "transaction"
    }

    fn transaction_id_field(&self) -> &'static str {
        "payment_id"
    }

    fn build_transaction_parameters(
        &self,
        basket: &Basket,
        order_number: &str,
    ) -> Result<TransactionParameters> {
        let mut params = TransactionParameters::new();
        params.insert("merchant".into(), self.config.merchant.clone());
        params.insert(
            "price".into(),
            basket.currency.format_amount(basket.total_incl_tax()),
        );
        params.insert("description".into(), Self::basket_description(basket));
        params.insert("transaction".into(), order_number.to_string());
        params.insert("callback_url".into(), self.config.callback_url.clone());
        params.insert("currency_code".into(), basket.currency.code_lower());
        params.insert("type".into(), self.config.payment_type.clone());
        params.insert(
            "timeout".into(),
            self.config.payment_timeout_secs.to_string(),
        );
        params.insert("nonce".into(), Uuid::new_v4().simple().to_string());

        let signature = self.codec.sign(&params);
        params.insert("signature".into(), signature);

        // Not signed: consumed by our own QR page
        params.insert(
            "payment_page_url".into(),
            self.config.payment_page_url.clone(),
        );
        params.insert("api_url".into(), self.config.api_url.clone());

        Ok(params)
    }

    fn interpret_response(
        &self,
        notification: &Notification,
        basket: &BasketSnapshot,
    ) -> ProcessorDecision {
        if !self.codec.verify(notification) {
            return ProcessorDecision::InvalidSignature;
        }

        if let Some(decision) = duplicate_check(basket) {
            return decision;
        }

        let result = notification.get("result").map(String::as_str).unwrap_or_default();
        match result {
            "0" => {
                let total = match captured_amount(notification, basket, "cash_amount") {
                    Ok(total) => total,
                    Err(decision) => return decision,
                };
                let currency = notification
                    .get("cash_currency")
                    .filter(|c| !c.is_empty())
                    .map(|c| c.to_uppercase())
                    .unwrap_or_else(|| basket.currency.to_string());

                ProcessorDecision::Accepted(HandledProcessorResponse {
                    transaction_id: notification
                        .get(self.transaction_id_field())
                        .filter(|id| !id.is_empty())
                        .cloned(),
                    total,
                    currency,
                    card_number: WECHAT_QR_LABEL.to_string(),
                    card_type: WECHAT_QR_LABEL.to_string(),
                })
            }
            "cancel" => ProcessorDecision::UserCancelled,
            "decline" => ProcessorDecision::Declined,
            "error" => ProcessorDecision::GatewayError,
            "review" => ProcessorDecision::AuthorizationPending,
            other => ProcessorDecision::UnrecognizedDecision(other.to_string()),
        }
    }

    async fn issue_credit(
        &self,
        order_number: &str,
        _reference: &str,
        _amount: Decimal,
        _currency: Currency,
    ) -> Result<CreditOutcome> {
        tracing::error!(
            processor = FOMOPAY,
            order_number = %order_number,
            "FOMO Pay processor can not issue credits or refunds"
        );
        Err(AppError::CreditNotSupported(FOMOPAY.to_string()))
    }
}
