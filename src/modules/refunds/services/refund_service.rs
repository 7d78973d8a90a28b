use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::core::{AppError, Result};
use crate::modules::orders::models::{Order, OrderStatus};
use crate::modules::orders::repositories::OrderRepository;
use crate::modules::orders::services::FulfillmentClient;
use crate::modules::payments::{PaymentProcessor, ProcessorRegistry};
use crate::modules::refunds::models::{
    NewRefund, NewRefundLine, Refund, RefundLineStatus, RefundStatus,
};
use crate::modules::refunds::repositories::RefundRepository;

/// Admin action on a refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundAction {
    /// Credit the payment and revoke fulfillment
    Approve,
    /// Credit the payment, keep fulfillment in place
    ApprovePaymentOnly,
    /// Credit was issued outside the gateway; revoke fulfillment only
    ApproveOffline,
    Deny,
}

/// Service for refund business logic
pub struct RefundService {
    refund_repo: Arc<dyn RefundRepository>,
    order_repo: Arc<dyn OrderRepository>,
    processors: ProcessorRegistry,
    fulfillment: Arc<dyn FulfillmentClient>,
}

impl RefundService {
    pub fn new(
        refund_repo: Arc<dyn RefundRepository>,
        order_repo: Arc<dyn OrderRepository>,
        processors: ProcessorRegistry,
        fulfillment: Arc<dyn FulfillmentClient>,
    ) -> Self {
        Self {
            refund_repo,
            order_repo,
            processors,
            fulfillment,
        }
    }

    pub async fn get(&self, id: u64) -> Result<Refund> {
        self.refund_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Refund {} not found", id)))
    }

    /// Create a refund for an order by number
    pub async fn create_for_order_number(
        &self,
        order_number: &str,
        line_ids: Option<&[u64]>,
    ) -> Result<Option<Refund>> {
        let order = self
            .order_repo
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order_number)))?;

        self.create_with_lines(&order, line_ids).await
    }

    /// Create a refund covering the given order lines
    ///
    /// # Arguments
    /// * `order` - A `Complete` order
    /// * `line_ids` - Lines to refund; all lines when `None`
    ///
    /// # Returns
    /// `None` when every requested line is already covered by a refund that
    /// was not denied. Zero-credit refunds are approved immediately without
    /// revoking fulfillment.
    pub async fn create_with_lines(
        &self,
        order: &Order,
        line_ids: Option<&[u64]>,
    ) -> Result<Option<Refund>> {
        if order.status != OrderStatus::Complete {
            return Err(AppError::validation(format!(
                "Order {} is [{}]; only complete orders can be refunded",
                order.number, order.status
            )));
        }

        if let Some(ids) = line_ids {
            if let Some(unknown) = ids.iter().find(|id| order.line(**id).is_none()) {
                return Err(AppError::validation(format!(
                    "Line {} does not belong to order {}",
                    unknown, order.number
                )));
            }
        }

        let refunded: HashSet<u64> = self
            .refund_repo
            .find_by_order(order.id)
            .await?
            .iter()
            .flat_map(|refund| refund.lines.iter())
            .filter(|line| line.status != RefundLineStatus::Denied)
            .map(|line| line.order_line_id)
            .collect();

        let lines: Vec<NewRefundLine> = order
            .lines
            .iter()
            .filter(|line| line_ids.map_or(true, |ids| ids.contains(&line.id)))
            .filter(|line| !refunded.contains(&line.id))
            .map(|line| NewRefundLine {
                order_line_id: line.id,
                line_credit_excl_tax: line.line_price_incl_tax,
                quantity: line.quantity,
            })
            .collect();

        if lines.is_empty() {
            tracing::info!(order_number = %order.number, "No refundable lines");
            return Ok(None);
        }

        let mut refund = self
            .refund_repo
            .create(NewRefund {
                order_id: order.id,
                user_id: order.user_id,
                currency: order.currency,
                lines,
            })
            .await?;

        tracing::info!(
            target: "audit",
            event = "refund_created",
            refund_id = refund.id,
            order_number = %order.number,
            total_credit_excl_tax = %refund.total_credit_excl_tax,
            num_items = refund.num_items(),
        );

        if refund.total_credit_excl_tax.is_zero() {
            self.approve(&mut refund, true, false).await?;
        }

        Ok(Some(refund))
    }

    /// Apply an admin action to a stored refund
    pub async fn process(&self, id: u64, action: RefundAction) -> Result<(Refund, bool)> {
        let mut refund = self.get(id).await?;
        let done = match action {
            RefundAction::Approve => self.approve(&mut refund, true, true).await?,
            RefundAction::ApprovePaymentOnly => self.approve(&mut refund, true, false).await?,
            RefundAction::ApproveOffline => self.approve(&mut refund, false, true).await?,
            RefundAction::Deny => self.deny(&mut refund).await?,
        };
        Ok((refund, done))
    }

    /// Approve a refund, resuming from wherever a previous attempt stopped
    ///
    /// # Arguments
    /// * `refund_payment` - Credit through the order's processor; when false
    ///   the credit is treated as issued out of band
    /// * `revoke_fulfillment` - Revoke what each refunded line granted
    ///
    /// # Returns
    /// `true` once the refund is `Complete`
    pub async fn approve(
        &self,
        refund: &mut Refund,
        refund_payment: bool,
        revoke_fulfillment: bool,
    ) -> Result<bool> {
        if refund.status == RefundStatus::Complete {
            return Ok(true);
        }
        if !refund.can_approve() {
            tracing::info!(
                refund_id = refund.id,
                status = %refund.status,
                "Refund can not be approved"
            );
            return Ok(false);
        }

        let order = self
            .order_repo
            .find_by_id(refund.order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", refund.order_id)))?;

        if matches!(refund.status, RefundStatus::Open | RefundStatus::PaymentRefundError) {
            let credited = if refund_payment && !refund.total_credit_excl_tax.is_zero() {
                self.issue_credit(&order, refund).await
            } else {
                Ok(())
            };

            match credited {
                Ok(()) => refund.set_status(RefundStatus::PaymentRefunded)?,
                Err(e) => {
                    tracing::error!(
                        refund_id = refund.id,
                        order_number = %order.number,
                        error = %e,
                        "Failed to issue credit for refund"
                    );
                    refund.set_status(RefundStatus::PaymentRefundError)?;
                    self.refund_repo.save_statuses(refund).await?;
                    return Ok(false);
                }
            }
        }

        for line in refund.lines.iter_mut() {
            if !matches!(line.status, RefundLineStatus::Open | RefundLineStatus::RevocationError) {
                continue;
            }

            let revoked = if revoke_fulfillment {
                match order.line(line.order_line_id) {
                    Some(order_line) => self.fulfillment.revoke_line(&order, order_line).await.is_ok(),
                    None => false,
                }
            } else {
                true
            };

            if revoked {
                line.set_status(RefundLineStatus::Complete)?;
                if revoke_fulfillment {
                    tracing::info!(
                        target: "audit",
                        event = "line_revoked",
                        order_number = %order.number,
                        order_line_id = line.order_line_id,
                        user_id = order.user_id,
                    );
                }
            } else {
                tracing::error!(
                    refund_id = refund.id,
                    order_line_id = line.order_line_id,
                    "Failed to revoke fulfillment of refund line"
                );
                line.set_status(RefundLineStatus::RevocationError)?;
            }
        }

        if refund.lines.iter().all(|line| line.status == RefundLineStatus::Complete) {
            refund.set_status(RefundStatus::Complete)?;
        } else {
            refund.set_status(RefundStatus::RevocationError)?;
        }

        self.refund_repo.save_statuses(refund).await?;

        Ok(refund.status == RefundStatus::Complete)
    }

    /// Deny an open refund and all of its lines
    pub async fn deny(&self, refund: &mut Refund) -> Result<bool> {
        if refund.status == RefundStatus::Denied {
            return Ok(true);
        }
        if !refund.can_deny() {
            tracing::info!(refund_id = refund.id, status = %refund.status, "Refund can not be denied");
            return Ok(false);
        }

        refund.set_status(RefundStatus::Denied)?;
        for line in refund.lines.iter_mut() {
            line.set_status(RefundLineStatus::Denied)?;
        }

        self.refund_repo.save_statuses(refund).await?;
        tracing::info!(refund_id = refund.id, "Refund denied");

        Ok(true)
    }

    async fn issue_credit(&self, order: &Order, refund: &Refund) -> Result<()> {
        let source = self
            .order_repo
            .find_payment_sources(order.id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::not_found(format!("Order {} has no payment source", order.number))
            })?;

        let processor = self.processors.require(&source.source_type)?;
        let outcome = processor
            .issue_credit(
                &order.number,
                &source.reference,
                refund.total_credit_excl_tax,
                refund.currency,
            )
            .await?;

        tracing::info!(
            refund_id = refund.id,
            processor = processor.name(),
            transaction_id = %outcome.transaction_id,
            "Credit issued"
        );

        Ok(())
    }
}
