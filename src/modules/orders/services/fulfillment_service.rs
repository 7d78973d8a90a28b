use std::sync::Arc;

use crate::core::{AppError, Result};
use crate::modules::orders::models::{
    ensure_transition, LineStatus, Order, OrderStatus, PipelineStatus,
};
use crate::modules::orders::repositories::OrderRepository;

use super::fulfillment_client::FulfillmentClient;

/// Service that grants purchased products and tracks line/order fulfillment status
pub struct FulfillmentService {
    order_repo: Arc<dyn OrderRepository>,
    client: Arc<dyn FulfillmentClient>,
}

impl FulfillmentService {
    pub fn new(order_repo: Arc<dyn OrderRepository>, client: Arc<dyn FulfillmentClient>) -> Self {
        Self { order_repo, client }
    }

    /// Fulfill every open or failed line of an order
    ///
    /// # Arguments
    /// * `order` - Order in `Open` or `Fulfillment Error`
    ///
    /// # Returns
    /// The order with updated statuses, already persisted. A `Complete`
    /// order is returned unchanged.
    pub async fn fulfill_order(&self, mut order: Order) -> Result<Order> {
        if order.status == OrderStatus::Complete {
            return Ok(order);
        }
        ensure_transition(order.status, OrderStatus::Complete)?;

        tracing::info!(order_number = %order.number, "Attempting to fulfill order");

        for idx in 0..order.lines.len() {
            let status = order.lines[idx].status;
            if status != LineStatus::Open && !status.is_fulfillment_error() {
                continue;
            }

            let outcome = self.client.fulfill_line(&order, &order.lines[idx]).await;
            let line = &mut order.lines[idx];
            match outcome {
                Ok(()) => {
                    line.set_status(LineStatus::Complete)?;
                    tracing::info!(
                        target: "audit",
                        event = "line_fulfilled",
                        order_number = %order.number,
                        order_line_id = line.id,
                        product_class = %line.product_class,
                        course_id = line.course_id.as_deref().unwrap_or_default(),
                        mode = line.seat_type.as_deref().unwrap_or_default(),
                        user_id = order.user_id,
                    );
                }
                Err(failure) => {
                    tracing::error!(
                        order_number = %order.number,
                        order_line_id = line.id,
                        error = %failure,
                        "Unable to fulfill line"
                    );
                    // A line already in an error status keeps its first failure
                    if line.status.can_transition_to(failure.line_status()) {
                        line.set_status(failure.line_status())?;
                    }
                }
            }
        }

        if order.lines.iter().all(|line| line.status == LineStatus::Complete) {
            order.set_status(OrderStatus::Complete)?;
        } else if order.status == OrderStatus::Open {
            order.set_status(OrderStatus::FulfillmentError)?;
        }

        self.order_repo.save_statuses(&order).await?;

        tracing::info!(
            order_number = %order.number,
            status = %order.status,
            "Finished fulfilling order"
        );

        Ok(order)
    }

    /// Retry fulfillment for an order looked up by number
    pub async fn fulfill_by_number(&self, number: &str) -> Result<Order> {
        let order = self
            .order_repo
            .find_by_number(number)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", number)))?;

        self.fulfill_order(order).await
    }
}
