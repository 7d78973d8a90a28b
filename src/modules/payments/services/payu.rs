use async_trait::async_trait;
use rust_decimal::Decimal;

use super::processor::{
    captured_amount, duplicate_check, BasketSnapshot, CreditOutcome, HandledProcessorResponse,
    Notification, PaymentProcessor, ProcessorDecision, TransactionParameters,
};
use super::signature::{PayuMd5, PayuSignatureKind, SignatureCodec};
use crate::config::PayuConfig;
use crate::core::{AppError, Currency, Result};
use crate::modules::baskets::Basket;

pub const PAYU: &str = "payu";

const TRANSACTION_ACCEPTED: &str = "4";
const TRANSACTION_EXPIRED: &str = "5";
const TRANSACTION_DECLINED: &str = "6";
const TRANSACTION_PENDING: &str = "7";
const TRANSACTION_ERROR: &str = "104";

/// PayU Latam web checkout integration
pub struct Payu {
    config: PayuConfig,
    form_codec: PayuMd5,
    confirmation_codec: PayuMd5,
}

impl Payu {
    pub fn new(config: PayuConfig) -> Self {
        let form_codec = PayuMd5::new(
            config.api_key.clone(),
            config.merchant_id.clone(),
            PayuSignatureKind::PaymentForm,
        );
        let confirmation_codec = PayuMd5::new(
            config.api_key.clone(),
            config.merchant_id.clone(),
            PayuSignatureKind::Confirmation,
        );

        Self {
            config,
            form_codec,
            confirmation_codec,
        }
    }

    pub fn confirmation_codec(&self) -> &PayuMd5 {
        &self.confirmation_codec
    }

    /// Field carrying the order number on the payer return (GET) leg
    pub fn return_reference_field(&self) -> &'static str {
        "referenceCode"
    }
}

#[async_trait]
impl PaymentProcessor for Payu {
    fn name(&self) -> &'static str {
        PAYU
    }

    fn reference_field(&self) -> &'static str {
        "reference_sale"
    }

    fn transaction_id_field(&self) -> &'static str {
        "transaction_id"
    }

    fn build_transaction_parameters(
        &self,
        basket: &Basket,
        order_number: &str,
    ) -> Result<TransactionParameters> {
        let mut params = TransactionParameters::new();
        params.insert(
            "payment_page_url".into(),
            self.config.payment_page_url.clone(),
        );
        params.insert("merchantId".into(), self.config.merchant_id.clone());
        params.insert("accountId".into(), self.config.account_id.clone());
        params.insert("referenceCode".into(), order_number.to_string());
        params.insert("tax".into(), self.config.tax.clone());
        params.insert("taxReturnBase".into(), self.config.tax_return_base.clone());
        params.insert("currency".into(), basket.currency.to_string());
        params.insert("buyerEmail".into(), basket.owner.email.clone());
        params.insert("buyerFullName".into(), basket.owner.full_name.clone());
        params.insert(
            "amount".into(),
            basket.currency.format_amount(basket.total_incl_tax()),
        );
        params.insert("responseUrl".into(), self.config.response_url.clone());
        params.insert(
            "confirmationUrl".into(),
            self.config.confirmation_url.clone(),
        );

        if let Some(course_id) = basket.first_seat().and_then(|seat| seat.course_id.clone()) {
            params.insert("description".into(), course_id);
        }

        if let Some(test) = &self.config.test {
            params.insert("test".into(), test.clone());
        }

        let signature = self.form_codec.sign(&params);
        params.insert("signature".into(), signature);

        Ok(params)
    }

    fn interpret_response(
        &self,
        notification: &Notification,
        basket: &BasketSnapshot,
    ) -> ProcessorDecision {
        if !self.confirmation_codec.verify(notification) {
            return ProcessorDecision::InvalidSignature;
        }

        if let Some(decision) = duplicate_check(basket) {
            return decision;
        }

        let state = notification.get("state_pol").map(String::as_str).unwrap_or_default();
        match state {
            TRANSACTION_ACCEPTED => {
                let total = match captured_amount(notification, basket, "value") {
                    Ok(total) => total,
                    Err(decision) => return decision,
                };
                let field = |name: &str| notification.get(name).cloned().unwrap_or_default();

                ProcessorDecision::Accepted(HandledProcessorResponse {
                    transaction_id: notification
                        .get(self.transaction_id_field())
                        .filter(|id| !id.is_empty())
                        .cloned(),
                    total,
                    currency: notification
                        .get("currency")
                        .filter(|c| !c.is_empty())
                        .cloned()
                        .unwrap_or_else(|| basket.currency.to_string()),
                    card_number: field("cc_number"),
                    card_type: field("lapPaymentMethod"),
                })
            }
            TRANSACTION_DECLINED | TRANSACTION_EXPIRED => ProcessorDecision::Declined,
            TRANSACTION_PENDING => ProcessorDecision::AuthorizationPending,
            TRANSACTION_ERROR => ProcessorDecision::GatewayError,
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
        // PayU refunds go through a separate API that is not integrated
        tracing::error!(
            processor = PAYU,
            order_number = %order_number,
            "PayU processor can not issue credits or refunds"
        );
        Err(AppError::CreditNotSupported(PAYU.to_string()))
    }
}
