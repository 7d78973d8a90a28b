use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::core::{AppError, Result};
use crate::modules::baskets::{Basket, BasketRepository, BasketStatus, NewBasket};
use crate::modules::orders::{Order, OrderPlacement, OrderRepository, PlacementOutcome};
use crate::modules::payments::{
    NewProcessorResponse, PaymentSource, ProcessorResponse, ProcessorResponseRepository,
};
use crate::modules::refunds::{NewRefund, Refund, RefundRepository};

#[derive(Default)]
struct Sequence(u64);

impl Sequence {
    fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// Keep generated ids clear of an explicitly seeded one
    fn observe(&mut self, id: u64) {
        self.0 = self.0.max(id);
    }
}

/// Baskets, orders and refunds guarded together, so placement is atomic
#[derive(Default)]
struct Commerce {
    baskets: HashMap<u64, Basket>,
    orders: HashMap<u64, Order>,
    payment_sources: Vec<PaymentSource>,
    refunds: HashMap<u64, Refund>,
    basket_ids: Sequence,
    order_ids: Sequence,
    line_ids: Sequence,
    source_ids: Sequence,
    refund_ids: Sequence,
    refund_line_ids: Sequence,
}

impl Commerce {
    fn insert_basket(&mut self, basket: NewBasket) -> Basket {
        let created = Basket {
            id: self.basket_ids.next(),
            owner: basket.owner,
            currency: basket.currency,
            status: BasketStatus::Open,
            lines: basket.lines,
            created_at: Utc::now(),
        };
        self.baskets.insert(created.id, created.clone());
        created
    }

    fn order_by_number(&self, number: &str) -> Option<&Order> {
        self.orders.values().find(|order| order.number == number)
    }
}

/// A thread-safe in-memory backend implementing every repository.
///
/// One mutex covers baskets, orders, payment sources and refunds; the
/// processor response ledger has its own lock so recording a callback never
/// waits on order placement.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    commerce: Arc<Mutex<Commerce>>,
    ledger: Arc<RwLock<Vec<ProcessorResponse>>>,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a basket with a fixed id and status
    pub async fn insert_basket(&self, basket: Basket) {
        let mut commerce = self.commerce.lock().await;
        commerce.basket_ids.observe(basket.id);
        commerce.baskets.insert(basket.id, basket);
    }

    /// Seed an order as-is, e.g. one already fulfilled
    pub async fn insert_order(&self, order: Order) {
        let mut commerce = self.commerce.lock().await;
        commerce.order_ids.observe(order.id);
        for line in &order.lines {
            commerce.line_ids.observe(line.id);
        }
        commerce.orders.insert(order.id, order);
    }

    pub async fn basket_count(&self) -> usize {
        self.commerce.lock().await.baskets.len()
    }

    pub async fn order_count(&self) -> usize {
        self.commerce.lock().await.orders.len()
    }

    pub async fn payment_sources(&self) -> Vec<PaymentSource> {
        self.commerce.lock().await.payment_sources.clone()
    }

    pub async fn ledger_entries(&self) -> Vec<ProcessorResponse> {
        self.ledger.read().await.clone()
    }
}

#[async_trait]
impl BasketRepository for InMemoryStore {
    async fn create(&self, basket: NewBasket) -> Result<Basket> {
        let mut commerce = self.commerce.lock().await;
        Ok(commerce.insert_basket(basket))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Basket>> {
        let commerce = self.commerce.lock().await;
        Ok(commerce.baskets.get(&id).cloned())
    }

    async fn update_status(&self, id: u64, status: BasketStatus) -> Result<()> {
        let mut commerce = self.commerce.lock().await;
        let basket = commerce
            .baskets
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Basket {} not found", id)))?;
        basket.status = status;
        Ok(())
    }

    async fn recycle(&self, basket_id: u64) -> Result<Option<Basket>> {
        let mut commerce = self.commerce.lock().await;
        let current = commerce
            .baskets
            .get(&basket_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Basket {} not found", basket_id)))?;

        if !current.status.can_be_submitted() {
            return Ok(None);
        }

        let created = commerce.insert_basket(NewBasket::replacing(&current));
        if let Some(old) = commerce.baskets.get_mut(&basket_id) {
            old.status = BasketStatus::Closed;
        }
        Ok(Some(created))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn place_order(&self, placement: OrderPlacement) -> Result<PlacementOutcome> {
        let mut commerce = self.commerce.lock().await;

        let basket_status = commerce
            .baskets
            .get(&placement.basket_id)
            .map(|basket| basket.status)
            .ok_or_else(|| {
                AppError::not_found(format!("Basket {} not found", placement.basket_id))
            })?;

        if commerce.order_by_number(&placement.number).is_some()
            || basket_status == BasketStatus::Submitted
        {
            return Ok(PlacementOutcome::Duplicate(placement.number));
        }

        // Ids are reserved up front; nothing is stored until the order is built
        let order_id = commerce.order_ids.next();
        let line_ids: Vec<u64> = placement
            .lines
            .iter()
            .map(|_| commerce.line_ids.next())
            .collect();
        let source = placement
            .source
            .clone()
            .into_source(commerce.source_ids.next(), order_id);

        let order = placement.into_order(order_id, &line_ids, Utc::now())?;

        commerce.payment_sources.push(source);
        commerce.orders.insert(order.id, order.clone());
        if let Some(basket) = commerce.baskets.get_mut(&placement.basket_id) {
            basket.status = BasketStatus::Submitted;
        }

        Ok(PlacementOutcome::Created(order))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Order>> {
        let commerce = self.commerce.lock().await;
        Ok(commerce.orders.get(&id).cloned())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Order>> {
        let commerce = self.commerce.lock().await;
        Ok(commerce.order_by_number(number).cloned())
    }

    async fn exists_by_number(&self, number: &str) -> Result<bool> {
        let commerce = self.commerce.lock().await;
        Ok(commerce.order_by_number(number).is_some())
    }

    async fn save_statuses(&self, order: &Order) -> Result<()> {
        let mut commerce = self.commerce.lock().await;
        let stored = commerce
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order.number)))?;

        stored.status = order.status;
        for line in stored.lines.iter_mut() {
            if let Some(updated) = order.line(line.id) {
                line.status = updated.status;
            }
        }
        Ok(())
    }

    async fn find_payment_sources(&self, order_id: u64) -> Result<Vec<PaymentSource>> {
        let commerce = self.commerce.lock().await;
        Ok(commerce
            .payment_sources
            .iter()
            .filter(|source| source.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProcessorResponseRepository for InMemoryStore {
    async fn record(&self, entry: NewProcessorResponse) -> Result<ProcessorResponse> {
        let mut ledger = self.ledger.write().await;
        let recorded = ProcessorResponse {
            id: ledger.len() as u64 + 1,
            processor_name: entry.processor_name,
            response: entry.response,
            basket_id: entry.basket_id,
            transaction_id: entry.transaction_id,
            created_at: Utc::now(),
        };
        ledger.push(recorded.clone());
        Ok(recorded)
    }

    async fn find_by_basket(&self, basket_id: u64) -> Result<Vec<ProcessorResponse>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .iter()
            .filter(|entry| entry.basket_id == Some(basket_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RefundRepository for InMemoryStore {
    async fn create(&self, refund: NewRefund) -> Result<Refund> {
        let mut commerce = self.commerce.lock().await;
        let refund_id = commerce.refund_ids.next();
        let line_ids: Vec<u64> = refund
            .lines
            .iter()
            .map(|_| commerce.refund_line_ids.next())
            .collect();

        let created = refund.into_refund(refund_id, &line_ids, Utc::now());
        commerce.refunds.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Refund>> {
        let commerce = self.commerce.lock().await;
        Ok(commerce.refunds.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: u64) -> Result<Vec<Refund>> {
        let commerce = self.commerce.lock().await;
        let mut refunds: Vec<Refund> = commerce
            .refunds
            .values()
            .filter(|refund| refund.order_id == order_id)
            .cloned()
            .collect();
        refunds.sort_by_key(|refund| refund.id);
        Ok(refunds)
    }

    async fn save_statuses(&self, refund: &Refund) -> Result<()> {
        let mut commerce = self.commerce.lock().await;
        let stored = commerce
            .refunds
            .get_mut(&refund.id)
            .ok_or_else(|| AppError::not_found(format!("Refund {} not found", refund.id)))?;

        stored.status = refund.status;
        for line in stored.lines.iter_mut() {
            if let Some(updated) = refund.lines.iter().find(|l| l.id == line.id) {
                line.status = updated.status;
            }
        }
        Ok(())
    }
}
