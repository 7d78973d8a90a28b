use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Currency, Result};
use crate::modules::baskets::models::{Basket, BasketLine, BasketOwner, BasketStatus, NewBasket};

/// Storage for baskets and their lines
#[async_trait]
pub trait BasketRepository: Send + Sync {
    /// Open a new basket
    async fn create(&self, basket: NewBasket) -> Result<Basket>;

    /// Find a basket by id, including its lines
    async fn find_by_id(&self, id: u64) -> Result<Option<Basket>>;

    /// Overwrite the basket status
    async fn update_status(&self, id: u64, status: BasketStatus) -> Result<()>;

    /// Replace a basket after a failed payment
    ///
    /// Opens a new basket for the same owner holding the old lines (quantities
    /// not added) and closes the old one. The old basket is never reopened, so
    /// its order number can not be offered to a gateway twice.
    ///
    /// The status is re-read under the basket lock. Returns `None` when the
    /// basket is no longer open or frozen, e.g. an order was placed for it.
    async fn recycle(&self, basket_id: u64) -> Result<Option<Basket>>;
}

/// MySQL-backed basket repository
pub struct MySqlBasketRepository {
    pool: MySqlPool,
}

impl MySqlBasketRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BasketRepository for MySqlBasketRepository {
    async fn create(&self, basket: NewBasket) -> Result<Basket> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let created = insert_basket_with_tx(&mut tx, &basket).await?;

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(created)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Basket>> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let basket = find_basket_with_tx(&mut tx, id, false).await?;

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(basket)
    }

    async fn update_status(&self, id: u64, status: BasketStatus) -> Result<()> {
        let result = sqlx::query("UPDATE baskets SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to update basket status: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Basket {} not found", id)));
        }

        Ok(())
    }

    async fn recycle(&self, basket_id: u64) -> Result<Option<Basket>> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let basket = find_basket_with_tx(&mut tx, basket_id, true)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Basket {} not found", basket_id)))?;

        if !basket.status.can_be_submitted() {
            tx.rollback().await
                .map_err(|e| AppError::Internal(format!("Failed to rollback transaction: {}", e)))?;
            return Ok(None);
        }

        let replacement = NewBasket::replacing(&basket);
        let created = insert_basket_with_tx(&mut tx, &replacement).await?;

        sqlx::query("UPDATE baskets SET status = ?, updated_at = ? WHERE id = ?")
            .bind(BasketStatus::Closed.to_string())
            .bind(Utc::now())
            .bind(basket.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to close basket: {}", e)))?;

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(Some(created))
    }
}

/// Insert a basket and its lines within an existing transaction
async fn insert_basket_with_tx(
    tx: &mut Transaction<'_, MySql>,
    basket: &NewBasket,
) -> Result<Basket> {
    let created_at = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO baskets (
            owner_user_id, owner_username, owner_email, owner_full_name,
            currency, status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(basket.owner.user_id)
    .bind(&basket.owner.username)
    .bind(&basket.owner.email)
    .bind(&basket.owner.full_name)
    .bind(basket.currency.to_string())
    .bind(BasketStatus::Open.to_string())
    .bind(created_at)
    .bind(created_at)
    .execute(tx.as_mut())
    .await
    .map_err(|e| AppError::Internal(format!("Failed to create basket: {}", e)))?;

    let id = result.last_insert_id();

    for line in &basket.lines {
        sqlx::query(
            r#"
            INSERT INTO basket_lines (
                basket_id, product_id, title, product_class, course_id, seat_type,
                quantity, unit_price, discount
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id)
        .bind(line.product_id)
        .bind(&line.title)
        .bind(line.product_class.to_string())
        .bind(&line.course_id)
        .bind(&line.seat_type)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.discount)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create basket line: {}", e)))?;
    }

    Ok(Basket {
        id,
        owner: basket.owner.clone(),
        currency: basket.currency,
        status: BasketStatus::Open,
        lines: basket.lines.clone(),
        created_at,
    })
}

/// Load a basket within an existing transaction
///
/// With `for_update` the basket row stays locked until the transaction ends,
/// which serialises order placement for that basket.
pub(crate) async fn find_basket_with_tx(
    tx: &mut Transaction<'_, MySql>,
    id: u64,
    for_update: bool,
) -> Result<Option<Basket>> {
    let sql = if for_update {
        r#"
        SELECT id, owner_user_id, owner_username, owner_email, owner_full_name,
               currency, status, created_at
        FROM baskets
        WHERE id = ?
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, owner_user_id, owner_username, owner_email, owner_full_name,
               currency, status, created_at
        FROM baskets
        WHERE id = ?
        "#
    };

    let row = sqlx::query_as::<_, BasketRow>(sql)
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch basket: {}", e)))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, BasketLineRow>(
        r#"
        SELECT product_id, title, product_class, course_id, seat_type, quantity, unit_price, discount
        FROM basket_lines
        WHERE basket_id = ?
        ORDER BY id
        "#
    )
    .bind(id)
    .fetch_all(tx.as_mut())
    .await
    .map_err(|e| AppError::Internal(format!("Failed to fetch basket lines: {}", e)))?;

    Ok(Some(row.into_basket(lines)?))
}

/// Database row representation for baskets table
#[derive(sqlx::FromRow)]
struct BasketRow {
    id: u64,
    owner_user_id: u64,
    owner_username: String,
    owner_email: String,
    owner_full_name: String,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
}

/// Database row representation for basket_lines table
#[derive(sqlx::FromRow)]
struct BasketLineRow {
    product_id: u64,
    title: String,
    product_class: String,
    course_id: Option<String>,
    seat_type: Option<String>,
    quantity: u32,
    unit_price: Decimal,
    discount: Decimal,
}

impl BasketRow {
    fn into_basket(self, lines: Vec<BasketLineRow>) -> Result<Basket> {
        let currency: Currency = self.currency.parse().map_err(AppError::Internal)?;
        let status: BasketStatus = self.status.parse().map_err(AppError::Internal)?;

        Ok(Basket {
            id: self.id,
            owner: BasketOwner {
                user_id: self.owner_user_id,
                username: self.owner_username,
                email: self.owner_email,
                full_name: self.owner_full_name,
            },
            currency,
            status,
            lines: lines
                .into_iter()
                .map(|line| {
                    Ok(BasketLine {
                        product_id: line.product_id,
                        title: line.title,
                        product_class: line.product_class.parse().map_err(AppError::Internal)?,
                        course_id: line.course_id,
                        seat_type: line.seat_type,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                        discount: line.discount,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            created_at: self.created_at,
        })
    }
}
