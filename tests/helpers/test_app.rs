// Application harness over the in-memory backend

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use storefront_payments::app::{AppState, Repositories};
use storefront_payments::config::CheckoutConfig;
use storefront_payments::core::{AppError, Result};
use storefront_payments::infrastructure::InMemoryStore;
use storefront_payments::notifications::NotificationHandler;
use storefront_payments::orders::{
    FulfillmentClient, FulfillmentFailure, FulfillmentService, Order, OrderDispatcher, OrderLine,
    ProductFulfillment,
};
use storefront_payments::payments::services::{Params, QrLinkProvider};
use storefront_payments::refunds::RefundService;

use super::test_data::{numbers, registry};

/// Collects dispatched orders instead of fulfilling them
#[derive(Default)]
pub struct RecordingDispatcher {
    orders: Mutex<Vec<Order>>,
}

impl RecordingDispatcher {
    pub fn dispatched(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }
}

impl OrderDispatcher for RecordingDispatcher {
    fn dispatch(&self, order: Order) {
        self.orders.lock().unwrap().push(order);
    }
}

/// Fulfillment stub with scripted failures
///
/// Each call pops the next scripted result; once the script is empty every
/// call succeeds.
#[derive(Default)]
pub struct StubFulfillment {
    fulfill_script: Mutex<VecDeque<FulfillmentFailure>>,
    revoke_script: Mutex<VecDeque<FulfillmentFailure>>,
    fulfilled: Mutex<Vec<u64>>,
    revoked: Mutex<Vec<u64>>,
}

impl StubFulfillment {
    pub fn fail_next_fulfillment(&self, failure: FulfillmentFailure) {
        self.fulfill_script.lock().unwrap().push_back(failure);
    }

    pub fn fail_next_revocation(&self, failure: FulfillmentFailure) {
        self.revoke_script.lock().unwrap().push_back(failure);
    }

    /// Ids of lines fulfilled successfully, in call order
    pub fn fulfilled(&self) -> Vec<u64> {
        self.fulfilled.lock().unwrap().clone()
    }

    /// Ids of lines revoked successfully, in call order
    pub fn revoked(&self) -> Vec<u64> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl FulfillmentClient for StubFulfillment {
    async fn fulfill_line(
        &self,
        _order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        if let Some(failure) = self.fulfill_script.lock().unwrap().pop_front() {
            return Err(failure);
        }
        self.fulfilled.lock().unwrap().push(line.id);
        Ok(())
    }

    async fn revoke_line(
        &self,
        _order: &Order,
        line: &OrderLine,
    ) -> std::result::Result<(), FulfillmentFailure> {
        if let Some(failure) = self.revoke_script.lock().unwrap().pop_front() {
            return Err(failure);
        }
        self.revoked.lock().unwrap().push(line.id);
        Ok(())
    }
}

/// QR provider answering with a fixed link and keeping what it was sent
#[derive(Default)]
pub struct StubQr {
    requests: Mutex<Vec<Params>>,
}

impl StubQr {
    pub fn requests(&self) -> Vec<Params> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QrLinkProvider for StubQr {
    async fn qr_link(&self, params: &Params) -> Result<String> {
        self.requests.lock().unwrap().push(params.clone());
        let transaction = params
            .get("transaction")
            .ok_or_else(|| AppError::validation("transaction is required"))?;
        Ok(format!("weixin://wxpay/bizpayurl?pr={}", transaction))
    }
}

/// Fully wired services over one in-memory store
pub struct TestApp {
    pub store: InMemoryStore,
    pub state: AppState,
    pub dispatcher: Arc<RecordingDispatcher>,
    /// Receives seat lines
    pub fulfillment: Arc<StubFulfillment>,
    /// Receives course entitlement lines
    pub entitlements: Arc<StubFulfillment>,
    pub qr: Arc<StubQr>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_checkout(CheckoutConfig::default())
    }

    pub fn with_checkout(checkout: CheckoutConfig) -> Self {
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let fulfillment = Arc::new(StubFulfillment::default());
        let entitlements = Arc::new(StubFulfillment::default());
        let qr = Arc::new(StubQr::default());

        let state = AppState::new(
            Repositories::in_memory(&store),
            registry(),
            numbers(),
            checkout,
            Arc::new(ProductFulfillment::new(fulfillment.clone(), entitlements.clone())),
            qr.clone(),
            Some(dispatcher.clone()),
        );

        Self {
            store,
            state,
            dispatcher,
            fulfillment,
            entitlements,
            qr,
        }
    }

    pub fn handler(&self) -> &NotificationHandler {
        &self.state.notifications
    }

    pub fn fulfillment_service(&self) -> &FulfillmentService {
        &self.state.fulfillment
    }

    pub fn refunds(&self) -> &RefundService {
        &self.state.refunds
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
