use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use super::fomopay::Fomopay;
use super::payu::Payu;
use super::signature::Params;
use crate::core::{Currency, Result};
use crate::modules::baskets::Basket;

/// Signed parameters handed to the payer's browser or the gateway API
pub type TransactionParameters = Params;

/// Form fields of an inbound gateway callback
pub type Notification = Params;

/// What an adapter needs to know about the basket a callback refers to
#[derive(Debug, Clone, PartialEq)]
pub struct BasketSnapshot {
    pub total: Decimal,
    pub currency: Currency,
    /// An order already exists for the callback's order number
    pub order_exists: bool,
}

impl BasketSnapshot {
    pub fn of(basket: &Basket, order_exists: bool) -> Self {
        Self {
            total: basket.total_incl_tax(),
            currency: basket.currency,
            order_exists,
        }
    }
}

/// Payment details extracted from an accepted callback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandledProcessorResponse {
    pub transaction_id: Option<String>,
    pub total: Decimal,
    pub currency: String,
    pub card_number: String,
    pub card_type: String,
}

/// Classification of a gateway callback
///
/// Only `Accepted` leads to an order. Everything else is a business outcome,
/// not a fault.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorDecision {
    Accepted(HandledProcessorResponse),
    Declined,
    UserCancelled,
    GatewayError,
    AuthorizationPending,
    DuplicateReference,
    PartialAuthorization {
        requested: Decimal,
        authorized: Decimal,
    },
    InvalidSignature,
    UnrecognizedDecision(String),
}

/// Result of a credit issued through a gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditOutcome {
    pub transaction_id: String,
}

/// A payment gateway integration
///
/// Adapters are pure with respect to storage: everything they need about the
/// basket arrives through [`BasketSnapshot`].
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Registry key, e.g. `payu`
    fn name(&self) -> &'static str;

    /// Callback field holding our order number
    fn reference_field(&self) -> &'static str;

    /// Callback field holding the gateway's transaction id
    fn transaction_id_field(&self) -> &'static str;

    /// Signed parameters for the outbound leg
    fn build_transaction_parameters(
        &self,
        basket: &Basket,
        order_number: &str,
    ) -> Result<TransactionParameters>;

    /// Classify a callback
    ///
    /// Checks run in a fixed order: signature, duplicate reference, then the
    /// gateway's outcome code. The captured amount is checked against the
    /// basket total only for accepted payments.
    fn interpret_response(
        &self,
        notification: &Notification,
        basket: &BasketSnapshot,
    ) -> ProcessorDecision;

    /// Refund a captured payment
    async fn issue_credit(
        &self,
        order_number: &str,
        reference: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<CreditOutcome>;
}

/// Closed set of supported gateways
pub enum Processor {
    Fomopay(Fomopay),
    Payu(Payu),
}

impl Processor {
    fn inner(&self) -> &dyn PaymentProcessor {
        match self {
            Processor::Fomopay(p) => p,
            Processor::Payu(p) => p,
        }
    }
}

#[async_trait]
impl PaymentProcessor for Processor {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn reference_field(&self) -> &'static str {
        self.inner().reference_field()
    }

    fn transaction_id_field(&self) -> &'static str {
        self.inner().transaction_id_field()
    }

    fn build_transaction_parameters(
        &self,
        basket: &Basket,
        order_number: &str,
    ) -> Result<TransactionParameters> {
        self.inner().build_transaction_parameters(basket, order_number)
    }

    fn interpret_response(
        &self,
        notification: &Notification,
        basket: &BasketSnapshot,
    ) -> ProcessorDecision {
        self.inner().interpret_response(notification, basket)
    }

    async fn issue_credit(
        &self,
        order_number: &str,
        reference: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<CreditOutcome> {
        self.inner()
            .issue_credit(order_number, reference, amount, currency)
            .await
    }
}

/// Parse a gateway-reported amount; `None` when absent or empty
fn reported_amount(
    notification: &Notification,
    field: &str,
) -> Option<std::result::Result<Decimal, String>> {
    let raw = notification.get(field)?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(raw.parse::<Decimal>().map_err(|_| raw.to_string()))
}

/// Duplicate check, run after the signature check and before the outcome code
pub(crate) fn duplicate_check(basket: &BasketSnapshot) -> Option<ProcessorDecision> {
    basket
        .order_exists
        .then_some(ProcessorDecision::DuplicateReference)
}

/// Amount captured by an accepted payment
///
/// A missing amount falls back to the basket total. A reported amount that
/// differs from the total is a partial authorization.
pub(crate) fn captured_amount(
    notification: &Notification,
    basket: &BasketSnapshot,
    amount_field: &str,
) -> std::result::Result<Decimal, ProcessorDecision> {
    match reported_amount(notification, amount_field) {
        None => Ok(basket.total),
        Some(Ok(authorized)) if authorized == basket.total => Ok(authorized),
        Some(Ok(authorized)) => Err(ProcessorDecision::PartialAuthorization {
            requested: basket.total,
            authorized,
        }),
        Some(Err(raw)) => Err(ProcessorDecision::UnrecognizedDecision(format!(
            "{}={}",
            amount_field, raw
        ))),
    }
}
