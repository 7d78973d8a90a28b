// Order storage. Placement is the only write path that creates orders and it
// runs in a single transaction holding the basket row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Currency, Result};
use crate::modules::baskets::repositories::find_basket_with_tx;
use crate::modules::baskets::BasketStatus;
use crate::modules::orders::models::{
    LineStatus, Order, OrderLine, OrderPlacement, OrderStatus, PlacementOutcome,
};
use crate::modules::payments::PaymentSource;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Create payment source, order and lines for a paid basket, all or nothing
    ///
    /// Under the basket lock the order number is checked again; if an order
    /// already exists the result is `Duplicate` and nothing is written. The
    /// basket is marked `Submitted` in the same transaction.
    async fn place_order(&self, placement: OrderPlacement) -> Result<PlacementOutcome>;

    async fn find_by_id(&self, id: u64) -> Result<Option<Order>>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Order>>;

    async fn exists_by_number(&self, number: &str) -> Result<bool>;

    /// Persist order and line statuses
    async fn save_statuses(&self, order: &Order) -> Result<()>;

    async fn find_payment_sources(&self, order_id: u64) -> Result<Vec<PaymentSource>>;
}

/// MySQL-backed order repository
pub struct MySqlOrderRepository {
    pool: MySqlPool,
}

impl MySqlOrderRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_id: u64) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r#"
            SELECT id, product_id, title, product_class, course_id, seat_type, quantity,
                   line_price_incl_tax, status
            FROM order_lines
            WHERE order_id = ?
            ORDER BY id
            "#
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch order lines: {}", e)))?;

        rows.into_iter().map(|row| row.try_into()).collect()
    }

    async fn find_one(&self, column: &str, value: OrderKey<'_>) -> Result<Option<Order>> {
        let sql = format!(
            r#"
            SELECT id, number, basket_id, user_id, username, currency, total_incl_tax, total_excl_tax,
                   shipping_incl_tax, shipping_method, status, created_at
            FROM orders
            WHERE {} = ?
            "#,
            column
        );

        let query = sqlx::query_as::<_, OrderRow>(&sql);
        let query = match value {
            OrderKey::Id(id) => query.bind(id),
            OrderKey::Number(number) => query.bind(number),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch order: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = self.load_lines(row.id).await?;
        Ok(Some(row.into_order(lines)?))
    }
}

enum OrderKey<'a> {
    Id(u64),
    Number(&'a str),
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn place_order(&self, placement: OrderPlacement) -> Result<PlacementOutcome> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        // Serialises concurrent callbacks for the same basket
        let basket = find_basket_with_tx(&mut tx, placement.basket_id, true)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Basket {} not found", placement.basket_id))
            })?;

        let existing: Option<(u64,)> = sqlx::query_as("SELECT id FROM orders WHERE number = ?")
            .bind(&placement.number)
            .fetch_optional(tx.as_mut())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to check order number: {}", e)))?;

        if existing.is_some() || basket.status == BasketStatus::Submitted {
            tx.rollback().await
                .map_err(|e| AppError::Internal(format!("Failed to roll back transaction: {}", e)))?;
            return Ok(PlacementOutcome::Duplicate(placement.number));
        }

        let created_at = Utc::now();
        let placeholder_ids = vec![0; placement.lines.len()];
        let mut order = placement.into_order(0, &placeholder_ids, created_at)?;

        order.id = insert_order_with_tx(&mut tx, &order).await?;
        for line in &mut order.lines {
            line.id = insert_line_with_tx(&mut tx, order.id, line).await?;
        }

        let source = placement.source.clone();
        let result = sqlx::query(
            r#"
            INSERT INTO payment_sources (
                order_id, source_type, reference, label, card_type,
                amount_allocated, amount_debited, currency
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(order.id)
        .bind(&source.source_type)
        .bind(&source.reference)
        .bind(&source.label)
        .bind(&source.card_type)
        .bind(source.amount_allocated)
        .bind(source.amount_debited)
        .bind(source.currency.to_string())
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create payment source: {}", e)))?;
        tracing::debug!(
            payment_source_id = result.last_insert_id(),
            order_number = %order.number,
            "Payment source staged"
        );

        sqlx::query("UPDATE baskets SET status = ?, updated_at = ? WHERE id = ?")
            .bind(BasketStatus::Submitted.to_string())
            .bind(created_at)
            .bind(order.basket_id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to submit basket: {}", e)))?;

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(PlacementOutcome::Created(order))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Order>> {
        self.find_one("id", OrderKey::Id(id)).await
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Order>> {
        self.find_one("number", OrderKey::Number(number)).await
    }

    async fn exists_by_number(&self, number: &str) -> Result<bool> {
        let row: Option<(u64,)> = sqlx::query_as("SELECT id FROM orders WHERE number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to check order number: {}", e)))?;

        Ok(row.is_some())
    }

    async fn save_statuses(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let updated_at = Utc::now();

        sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(order.status.to_string())
            .bind(updated_at)
            .bind(order.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to update order status: {}", e)))?;

        for line in &order.lines {
            sqlx::query("UPDATE order_lines SET status = ? WHERE id = ? AND order_id = ?")
                .bind(line.status.to_string())
                .bind(line.id)
                .bind(order.id)
                .execute(tx.as_mut())
                .await
                .map_err(|e| {
                    AppError::Internal(format!("Failed to update order line status: {}", e))
                })?;
        }

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn find_payment_sources(&self, order_id: u64) -> Result<Vec<PaymentSource>> {
        let rows = sqlx::query_as::<_, PaymentSourceRow>(
            r#"
            SELECT id, order_id, source_type, reference, label, card_type,
                   amount_allocated, amount_debited, currency
            FROM payment_sources
            WHERE order_id = ?
            ORDER BY id
            "#
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payment sources: {}", e)))?;

        rows.into_iter().map(|row| row.try_into()).collect()
    }
}

async fn insert_order_with_tx(tx: &mut Transaction<'_, MySql>, order: &Order) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            number, basket_id, user_id, username, currency, total_incl_tax,
            total_excl_tax, shipping_incl_tax, shipping_method, status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(&order.number)
    .bind(order.basket_id)
    .bind(order.user_id)
    .bind(&order.username)
    .bind(order.currency.to_string())
    .bind(order.total_incl_tax)
    .bind(order.total_excl_tax)
    .bind(order.shipping_incl_tax)
    .bind(&order.shipping_method)
    .bind(order.status.to_string())
    .bind(order.created_at)
    .bind(order.created_at)
    .execute(tx.as_mut())
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::validation(format!(
                    "Order with number '{}' already exists",
                    order.number
                ));
            }
        }
        AppError::Internal(format!("Failed to create order: {}", e))
    })?;

    Ok(result.last_insert_id())
}

async fn insert_line_with_tx(
    tx: &mut Transaction<'_, MySql>,
    order_id: u64,
    line: &OrderLine,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO order_lines (
            order_id, product_id, title, product_class, course_id, seat_type, quantity,
            line_price_incl_tax, status
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(&line.title)
    .bind(line.product_class.to_string())
    .bind(&line.course_id)
    .bind(&line.seat_type)
    .bind(line.quantity)
    .bind(line.line_price_incl_tax)
    .bind(line.status.to_string())
    .execute(tx.as_mut())
    .await
    .map_err(|e| AppError::Internal(format!("Failed to create order line: {}", e)))?;

    Ok(result.last_insert_id())
}

/// Database row representation for orders table
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: u64,
    number: String,
    basket_id: u64,
    user_id: u64,
    username: String,
    currency: String,
    total_incl_tax: Decimal,
    total_excl_tax: Decimal,
    shipping_incl_tax: Decimal,
    shipping_method: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order> {
        Ok(Order {
            id: self.id,
            number: self.number,
            basket_id: self.basket_id,
            user_id: self.user_id,
            username: self.username,
            currency: self.currency.parse().map_err(AppError::Internal)?,
            total_incl_tax: self.total_incl_tax,
            total_excl_tax: self.total_excl_tax,
            shipping_incl_tax: self.shipping_incl_tax,
            shipping_method: self.shipping_method,
            status: self.status.parse::<OrderStatus>().map_err(AppError::Internal)?,
            lines,
            created_at: self.created_at,
        })
    }
}

/// Database row representation for order_lines table
#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: u64,
    product_id: u64,
    title: String,
    product_class: String,
    course_id: Option<String>,
    seat_type: Option<String>,
    quantity: u32,
    line_price_incl_tax: Decimal,
    status: String,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = AppError;

    fn try_from(row: OrderLineRow) -> Result<Self> {
        Ok(OrderLine {
            id: row.id,
            product_id: row.product_id,
            title: row.title,
            product_class: row.product_class.parse().map_err(AppError::Internal)?,
            course_id: row.course_id,
            seat_type: row.seat_type,
            quantity: row.quantity,
            line_price_incl_tax: row.line_price_incl_tax,
            status: row.status.parse::<LineStatus>().map_err(AppError::Internal)?,
        })
    }
}

/// Database row representation for payment_sources table
#[derive(sqlx::FromRow)]
struct PaymentSourceRow {
    id: u64,
    order_id: u64,
    source_type: String,
    reference: String,
    label: String,
    card_type: String,
    amount_allocated: Decimal,
    amount_debited: Decimal,
    currency: String,
}

impl TryFrom<PaymentSourceRow> for PaymentSource {
    type Error = AppError;

    fn try_from(row: PaymentSourceRow) -> Result<Self> {
        Ok(PaymentSource {
            id: row.id,
            order_id: row.order_id,
            source_type: row.source_type,
            reference: row.reference,
            label: row.label,
            card_type: row.card_type,
            amount_allocated: row.amount_allocated,
            amount_debited: row.amount_debited,
            currency: row.currency.parse::<Currency>().map_err(AppError::Internal)?,
        })
    }
}
