// Service wiring shared by the binary and the HTTP contract tests

use std::sync::Arc;

use actix_web::web;
use sqlx::MySqlPool;

use crate::config::CheckoutConfig;
use crate::core::OrderNumberGenerator;
use crate::infrastructure::InMemoryStore;
use crate::modules::baskets::{BasketRepository, BasketService, MySqlBasketRepository};
use crate::modules::health::controllers::health_controller;
use crate::modules::notifications::controllers::callback_controller;
use crate::modules::notifications::NotificationHandler;
use crate::modules::orders::controllers::order_controller;
use crate::modules::orders::{
    FulfillmentClient, FulfillmentService, MySqlOrderRepository, OrderDispatcher,
    OrderRepository, SpawnedFulfillment,
};
use crate::modules::payments::services::QrLinkProvider;
use crate::modules::payments::{
    MySqlProcessorResponseRepository, ProcessorRegistry, ProcessorResponseRepository,
};
use crate::modules::refunds::controllers::refund_controller;
use crate::modules::refunds::{MySqlRefundRepository, RefundRepository, RefundService};

/// Storage backends behind every service
#[derive(Clone)]
pub struct Repositories {
    pub baskets: Arc<dyn BasketRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub ledger: Arc<dyn ProcessorResponseRepository>,
    pub refunds: Arc<dyn RefundRepository>,
}

impl Repositories {
    pub fn mysql(pool: MySqlPool) -> Self {
        Self {
            baskets: Arc::new(MySqlBasketRepository::new(pool.clone())),
            orders: Arc::new(MySqlOrderRepository::new(pool.clone())),
            ledger: Arc::new(MySqlProcessorResponseRepository::new(pool.clone())),
            refunds: Arc::new(MySqlRefundRepository::new(pool)),
        }
    }

    pub fn in_memory(store: &InMemoryStore) -> Self {
        Self {
            baskets: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            refunds: Arc::new(store.clone()),
        }
    }
}

/// Everything the HTTP layer hands to its handlers
#[derive(Clone)]
pub struct AppState {
    pub notifications: Arc<NotificationHandler>,
    pub baskets: Arc<BasketService>,
    pub fulfillment: Arc<FulfillmentService>,
    pub refunds: Arc<RefundService>,
    pub orders: Arc<dyn OrderRepository>,
    pub registry: ProcessorRegistry,
    pub checkout: CheckoutConfig,
    pub qr: Arc<dyn QrLinkProvider>,
}

impl AppState {
    /// Wire services over `repos`
    ///
    /// Placed orders go to `dispatcher`; without one, fulfillment runs on a
    /// spawned task.
    pub fn new(
        repos: Repositories,
        registry: ProcessorRegistry,
        numbers: OrderNumberGenerator,
        checkout: CheckoutConfig,
        fulfillment_client: Arc<dyn FulfillmentClient>,
        qr: Arc<dyn QrLinkProvider>,
        dispatcher: Option<Arc<dyn OrderDispatcher>>,
    ) -> Self {
        let fulfillment = Arc::new(FulfillmentService::new(
            repos.orders.clone(),
            fulfillment_client.clone(),
        ));
        let dispatcher = dispatcher
            .unwrap_or_else(|| Arc::new(SpawnedFulfillment::new(fulfillment.clone())));

        let notifications = Arc::new(
            NotificationHandler::new(
                repos.baskets.clone(),
                repos.orders.clone(),
                repos.ledger.clone(),
                dispatcher,
                numbers,
            )
            .with_placement_grace(checkout.placement_grace_secs),
        );
        let refunds = Arc::new(RefundService::new(
            repos.refunds.clone(),
            repos.orders.clone(),
            registry.clone(),
            fulfillment_client,
        ));

        Self {
            notifications,
            baskets: Arc::new(BasketService::new(repos.baskets.clone())),
            fulfillment,
            refunds,
            orders: repos.orders,
            registry,
            checkout,
            qr,
        }
    }

    /// Register shared data and every route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.notifications.clone()))
            .app_data(web::Data::new(self.baskets.clone()))
            .app_data(web::Data::new(self.fulfillment.clone()))
            .app_data(web::Data::new(self.refunds.clone()))
            .app_data(web::Data::new(self.orders.clone()))
            .app_data(web::Data::new(self.registry.clone()))
            .app_data(web::Data::new(self.checkout.clone()))
            .app_data(web::Data::new(self.qr.clone()))
            .configure(health_controller::configure)
            .configure(callback_controller::configure)
            .configure(order_controller::configure)
            .configure(refund_controller::configure);
    }
}
