use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::Currency;
use crate::modules::payments::services::processor::HandledProcessorResponse;

/// Funds captured for an order through a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSource {
    pub id: u64,
    pub order_id: u64,
    /// Processor name, e.g. `fomopay`
    pub source_type: String,
    /// Gateway transaction id
    pub reference: String,
    /// Card number or payment method label
    pub label: String,
    pub card_type: String,
    pub amount_allocated: Decimal,
    pub amount_debited: Decimal,
    pub currency: Currency,
}

/// Payment source staged for order placement
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentSource {
    pub source_type: String,
    pub reference: String,
    pub label: String,
    pub card_type: String,
    pub amount_allocated: Decimal,
    pub amount_debited: Decimal,
    pub currency: Currency,
}

impl NewPaymentSource {
    /// Source for an accepted callback; amounts come from the basket total
    pub fn from_handled(
        processor_name: &str,
        handled: &HandledProcessorResponse,
        total: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            source_type: processor_name.to_string(),
            reference: handled.transaction_id.clone().unwrap_or_default(),
            label: handled.card_number.clone(),
            card_type: handled.card_type.clone(),
            amount_allocated: total,
            amount_debited: total,
            currency,
        }
    }

    pub fn into_source(self, id: u64, order_id: u64) -> PaymentSource {
        PaymentSource {
            id,
            order_id,
            source_type: self.source_type,
            reference: self.reference,
            label: self.label,
            card_type: self.card_type,
            amount_allocated: self.amount_allocated,
            amount_debited: self.amount_debited,
            currency: self.currency,
        }
    }
}
