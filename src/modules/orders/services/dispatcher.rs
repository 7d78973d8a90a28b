use std::sync::Arc;

use crate::modules::orders::models::Order;

use super::fulfillment_service::FulfillmentService;

/// Post-commit hook for freshly placed orders
///
/// Dispatch never fails the callback that placed the order; errors are
/// logged and the order stays retryable.
pub trait OrderDispatcher: Send + Sync {
    fn dispatch(&self, order: Order);
}

/// Runs fulfillment on a detached Tokio task
pub struct SpawnedFulfillment {
    service: Arc<FulfillmentService>,
}

impl SpawnedFulfillment {
    pub fn new(service: Arc<FulfillmentService>) -> Self {
        Self { service }
    }
}

impl OrderDispatcher for SpawnedFulfillment {
    fn dispatch(&self, order: Order) {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            let number = order.number.clone();
            if let Err(e) = service.fulfill_order(order).await {
                tracing::error!(order_number = %number, error = %e, "Fulfillment task failed");
            }
        });
    }
}
