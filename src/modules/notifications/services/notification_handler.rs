// Drives one inbound gateway callback from receipt to a terminal outcome.
// The ledger entry is written before any order work and outside the
// placement transaction, so it survives every later failure.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, OrderNumberGenerator, Result};
use crate::modules::baskets::{Basket, BasketRepository};
use crate::modules::orders::models::{OrderPlacement, OrderStatus, PlacementOutcome};
use crate::modules::orders::repositories::OrderRepository;
use crate::modules::orders::services::OrderDispatcher;
use crate::modules::payments::services::{Notification, Params};
use crate::modules::payments::{
    BasketSnapshot, NewPaymentSource, NewProcessorResponse, PaymentProcessor, Processor,
    ProcessorDecision, ProcessorResponseRepository,
};

/// States a callback passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackState {
    Received,
    BasketResolved,
    BasketNotFound,
    ResponseRecorded,
    SignatureValidated,
    InvalidSignature,
    OutcomeClassified,
    OrderCreated,
    Declined,
    Duplicate,
    Error,
}

/// Terminal outcome reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    OrderCreated,
    Declined,
    UserCancelled,
    Duplicate,
    InvalidSignature,
    PartialAuthorization,
    AuthorizationPending,
    GatewayError,
    UnrecognizedDecision,
    BasketNotFound,
    /// Recorded, but a storage fault stopped processing
    Error,
}

impl CallbackOutcome {
    /// Outcomes after which the payer can be sent to a receipt page
    pub fn has_order(&self) -> bool {
        matches!(self, CallbackOutcome::OrderCreated | CallbackOutcome::Duplicate)
    }
}

/// What happened to one callback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationReport {
    pub ledger_entry_id: u64,
    pub basket_id: Option<u64>,
    pub order_number: Option<String>,
    pub outcome: CallbackOutcome,
    /// Replacement basket created after a decline or cancellation
    pub recycled_basket_id: Option<u64>,
    pub trail: Vec<CallbackState>,
}

/// Payment progress for a basket, as shown to a waiting payer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Complete,
    Processing,
    AwaitingPayment,
    Failed,
}

/// Service handling gateway callbacks
pub struct NotificationHandler {
    baskets: Arc<dyn BasketRepository>,
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<dyn ProcessorResponseRepository>,
    dispatcher: Arc<dyn OrderDispatcher>,
    numbers: OrderNumberGenerator,
    placement_grace: Duration,
}

const DEFAULT_PLACEMENT_GRACE_SECS: i64 = 30;
const MAX_PLACEMENT_GRACE_SECS: u64 = 86_400;

impl NotificationHandler {
    pub fn new(
        baskets: Arc<dyn BasketRepository>,
        orders: Arc<dyn OrderRepository>,
        ledger: Arc<dyn ProcessorResponseRepository>,
        dispatcher: Arc<dyn OrderDispatcher>,
        numbers: OrderNumberGenerator,
    ) -> Self {
        Self {
            baskets,
            orders,
            ledger,
            dispatcher,
            numbers,
            placement_grace: Duration::seconds(DEFAULT_PLACEMENT_GRACE_SECS),
        }
    }

    /// Time an accepted payment may go without an order before its status
    /// turns to `Failed`
    pub fn with_placement_grace(mut self, secs: u64) -> Self {
        self.placement_grace = Duration::seconds(secs.min(MAX_PLACEMENT_GRACE_SECS) as i64);
        self
    }

    pub fn numbers(&self) -> &OrderNumberGenerator {
        &self.numbers
    }

    /// Handle a callback from `processor`
    ///
    /// # Returns
    /// A report for every callback whose reference maps to a basket id, even
    /// when the basket is gone. An unparseable reference is recorded and then
    /// fails with `InvalidBasket`. Once the ledger entry is written, faults end
    /// in the `Error` outcome instead of an `Err`; only storage faults before
    /// that point surface as errors.
    pub async fn handle(
        &self,
        processor: &Processor,
        notification: &Notification,
    ) -> Result<NotificationReport> {
        let mut trail = vec![CallbackState::Received];
        let name = processor.name();
        let transaction_id = notification.get(processor.transaction_id_field()).cloned();
        let reference = notification
            .get(processor.reference_field())
            .map(String::as_str)
            .unwrap_or_default();

        let basket_id = match self.numbers.basket_id(reference) {
            Ok(id) => id,
            Err(e) => {
                let entry = self.record(name, notification, None, transaction_id).await?;
                tracing::error!(
                    processor = name,
                    ledger_entry_id = entry,
                    reference = reference,
                    "Received payment notification with an unusable reference"
                );
                return Err(e);
            }
        };

        let basket = self.baskets.find_by_id(basket_id).await?;
        trail.push(if basket.is_some() {
            CallbackState::BasketResolved
        } else {
            CallbackState::BasketNotFound
        });

        let ledger_entry_id = self
            .record(name, notification, basket.as_ref().map(|b| b.id), transaction_id.clone())
            .await?;
        trail.push(CallbackState::ResponseRecorded);

        tracing::info!(
            target: "audit",
            event = "payment_received",
            processor = name,
            basket_id = basket_id,
            ledger_entry_id = ledger_entry_id,
            transaction_id = transaction_id.as_deref().unwrap_or_default(),
        );

        let Some(basket) = basket else {
            tracing::error!(
                processor = name,
                basket_id = basket_id,
                ledger_entry_id = ledger_entry_id,
                "Received payment notification for non-existent basket"
            );
            return Ok(NotificationReport {
                ledger_entry_id,
                basket_id: None,
                order_number: None,
                outcome: CallbackOutcome::BasketNotFound,
                recycled_basket_id: None,
                trail,
            });
        };

        let mut report = NotificationReport {
            ledger_entry_id,
            basket_id: Some(basket.id),
            order_number: None,
            outcome: CallbackOutcome::Error,
            recycled_basket_id: None,
            trail,
        };

        if let Err(e) = self.resolve(processor, notification, &basket, &mut report).await {
            tracing::error!(
                processor = name,
                basket_id = basket.id,
                ledger_entry_id = ledger_entry_id,
                error = %e,
                "Failed to process recorded payment notification"
            );
            report.trail.push(CallbackState::Error);
            report.outcome = CallbackOutcome::Error;
            report.order_number = None;
        }

        Ok(report)
    }

    /// Classify a recorded callback and act on the decision
    async fn resolve(
        &self,
        processor: &Processor,
        notification: &Notification,
        basket: &Basket,
        report: &mut NotificationReport,
    ) -> Result<()> {
        let name = processor.name();
        let ledger_entry_id = report.ledger_entry_id;
        let order_number = self.numbers.order_number(basket.id);
        let order_exists = self.orders.exists_by_number(&order_number).await?;
        let decision =
            processor.interpret_response(notification, &BasketSnapshot::of(basket, order_exists));

        if decision == ProcessorDecision::InvalidSignature {
            report.trail.push(CallbackState::InvalidSignature);
        } else {
            report.trail.push(CallbackState::SignatureValidated);
            report.trail.push(CallbackState::OutcomeClassified);
        }

        match decision {
            ProcessorDecision::Accepted(handled) => {
                let source = NewPaymentSource::from_handled(
                    name,
                    &handled,
                    basket.total_incl_tax(),
                    basket.currency,
                );
                let placement = OrderPlacement::from_basket(basket, order_number.as_str(), source);

                match self.orders.place_order(placement).await? {
                    PlacementOutcome::Created(order) => {
                        tracing::info!(
                            target: "audit",
                            event = "order_placed",
                            processor = name,
                            basket_id = basket.id,
                            ledger_entry_id = ledger_entry_id,
                            order_number = %order.number,
                            total_incl_tax = %order.total_incl_tax,
                            currency = %order.currency,
                        );
                        report.trail.push(CallbackState::OrderCreated);
                        report.outcome = CallbackOutcome::OrderCreated;
                        report.order_number = Some(order.number.clone());
                        self.dispatcher.dispatch(order);
                    }
                    PlacementOutcome::Duplicate(number) => {
                        tracing::info!(
                            processor = name,
                            basket_id = basket.id,
                            ledger_entry_id = ledger_entry_id,
                            order_number = %number,
                            "Order already placed by a concurrent notification"
                        );
                        report.trail.push(CallbackState::Duplicate);
                        report.outcome = CallbackOutcome::Duplicate;
                        report.order_number = Some(number);
                    }
                }
            }
            ProcessorDecision::DuplicateReference => {
                tracing::info!(
                    processor = name,
                    basket_id = basket.id,
                    ledger_entry_id = ledger_entry_id,
                    order_number = %order_number,
                    "Received notification for an order that already exists"
                );
                report.trail.push(CallbackState::Duplicate);
                report.outcome = CallbackOutcome::Duplicate;
                report.order_number = Some(order_number);
            }
            ProcessorDecision::Declined => {
                self.decline(basket, report, CallbackOutcome::Declined).await?;
            }
            ProcessorDecision::UserCancelled => {
                self.decline(basket, report, CallbackOutcome::UserCancelled).await?;
            }
            ProcessorDecision::InvalidSignature => {
                tracing::error!(
                    processor = name,
                    basket_id = basket.id,
                    ledger_entry_id = ledger_entry_id,
                    "Notification signature is invalid; possible tampering"
                );
                report.outcome = CallbackOutcome::InvalidSignature;
            }
            ProcessorDecision::PartialAuthorization { requested, authorized } => {
                tracing::error!(
                    processor = name,
                    basket_id = basket.id,
                    ledger_entry_id = ledger_entry_id,
                    requested = %requested,
                    authorized = %authorized,
                    "Partial authorization; manual reconciliation required"
                );
                report.trail.push(CallbackState::Error);
                report.outcome = CallbackOutcome::PartialAuthorization;
            }
            ProcessorDecision::AuthorizationPending => {
                tracing::error!(
                    processor = name,
                    basket_id = basket.id,
                    ledger_entry_id = ledger_entry_id,
                    "Payment is pending review at the gateway"
                );
                report.trail.push(CallbackState::Error);
                report.outcome = CallbackOutcome::AuthorizationPending;
            }
            ProcessorDecision::GatewayError => {
                tracing::error!(
                    processor = name,
                    basket_id = basket.id,
                    ledger_entry_id = ledger_entry_id,
                    "Gateway reported an error processing payment"
                );
                report.trail.push(CallbackState::Error);
                report.outcome = CallbackOutcome::GatewayError;
            }
            ProcessorDecision::UnrecognizedDecision(raw) => {
                tracing::error!(
                    processor = name,
                    basket_id = basket.id,
                    ledger_entry_id = ledger_entry_id,
                    decision = %raw,
                    "Gateway returned an unrecognized decision"
                );
                report.trail.push(CallbackState::Error);
                report.outcome = CallbackOutcome::UnrecognizedDecision;
            }
        }

        Ok(())
    }

    /// Current payment status for a gateway reference
    ///
    /// Replays the latest recorded callback when no order exists yet. An
    /// accepted payment that still has no order once the placement grace
    /// period is over is `Failed`, so the payer is never left waiting.
    pub async fn payment_status(
        &self,
        processor: &Processor,
        reference: &str,
    ) -> Result<PaymentStatus> {
        let basket_id = self.numbers.basket_id(reference)?;
        let basket = self
            .baskets
            .find_by_id(basket_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Basket {} not found", basket_id)))?;

        let order_number = self.numbers.order_number(basket.id);
        if let Some(order) = self.orders.find_by_number(&order_number).await? {
            return Ok(if order.status == OrderStatus::Complete {
                PaymentStatus::Complete
            } else {
                PaymentStatus::Processing
            });
        }

        let entries = self.ledger.find_by_basket(basket.id).await?;
        let Some(latest) = entries
            .iter()
            .rev()
            .find(|entry| entry.processor_name == processor.name())
        else {
            return Ok(PaymentStatus::AwaitingPayment);
        };

        let notification: Params = match latest.response.as_object() {
            Some(fields) => fields
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect(),
            None => Params::new(),
        };

        let snapshot = BasketSnapshot::of(&basket, false);
        let status = match processor.interpret_response(&notification, &snapshot) {
            ProcessorDecision::Accepted(_)
                if Utc::now() - latest.created_at < self.placement_grace =>
            {
                PaymentStatus::Processing
            }
            ProcessorDecision::AuthorizationPending => PaymentStatus::Processing,
            _ => PaymentStatus::Failed,
        };

        Ok(status)
    }

    async fn record(
        &self,
        processor_name: &str,
        notification: &Notification,
        basket_id: Option<u64>,
        transaction_id: Option<String>,
    ) -> Result<u64> {
        let entry = NewProcessorResponse::from_params(
            processor_name,
            notification,
            basket_id,
            transaction_id,
        );
        Ok(self.ledger.record(entry).await?.id)
    }

    /// Close out a declined or cancelled payment
    ///
    /// The basket is replaced by a fresh one so its order number is never
    /// reused. Baskets already closed or submitted are left alone; the status
    /// is checked under the basket lock, not on the snapshot.
    async fn decline(
        &self,
        basket: &Basket,
        report: &mut NotificationReport,
        outcome: CallbackOutcome,
    ) -> Result<()> {
        tracing::info!(
            basket_id = basket.id,
            ledger_entry_id = report.ledger_entry_id,
            outcome = ?outcome,
            "Payment not completed"
        );

        match self.baskets.recycle(basket.id).await? {
            Some(replacement) => {
                tracing::info!(
                    basket_id = basket.id,
                    new_basket_id = replacement.id,
                    "Basket recycled after unsuccessful payment"
                );
                report.recycled_basket_id = Some(replacement.id);
            }
            None => {
                tracing::info!(
                    basket_id = basket.id,
                    "Basket no longer open; not recycled"
                );
            }
        }

        report.trail.push(CallbackState::Declined);
        report.outcome = outcome;
        Ok(())
    }
}
