use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::refunds::models::{
    NewRefund, Refund, RefundLine, RefundLineStatus, RefundStatus,
};

#[async_trait]
pub trait RefundRepository: Send + Sync {
    /// Create a refund and its lines in one transaction
    async fn create(&self, refund: NewRefund) -> Result<Refund>;

    async fn find_by_id(&self, id: u64) -> Result<Option<Refund>>;

    /// All refunds raised against an order, oldest first
    async fn find_by_order(&self, order_id: u64) -> Result<Vec<Refund>>;

    /// Persist refund and refund line statuses
    async fn save_statuses(&self, refund: &Refund) -> Result<()>;
}

/// MySQL-backed refund repository
pub struct MySqlRefundRepository {
    pool: MySqlPool,
}

impl MySqlRefundRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, refund_id: u64) -> Result<Vec<RefundLine>> {
        let rows = sqlx::query_as::<_, RefundLineRow>(
            r#"
            SELECT id, order_line_id, line_credit_excl_tax, quantity, status
            FROM refund_lines
            WHERE refund_id = ?
            ORDER BY id
            "#
        )
        .bind(refund_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch refund lines: {}", e)))?;

        rows.into_iter().map(|row| row.try_into()).collect()
    }

    async fn hydrate(&self, row: RefundRow) -> Result<Refund> {
        let lines = self.load_lines(row.id).await?;
        row.into_refund(lines)
    }
}

#[async_trait]
impl RefundRepository for MySqlRefundRepository {
    async fn create(&self, refund: NewRefund) -> Result<Refund> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO refunds (
                order_id, user_id, currency, total_credit_excl_tax, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(refund.order_id)
        .bind(refund.user_id)
        .bind(refund.currency.to_string())
        .bind(refund.total_credit_excl_tax())
        .bind(RefundStatus::Open.to_string())
        .bind(created_at)
        .bind(created_at)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create refund: {}", e)))?;

        let refund_id = result.last_insert_id();
        let mut line_ids = Vec::with_capacity(refund.lines.len());

        for line in &refund.lines {
            let result = sqlx::query(
                r#"
                INSERT INTO refund_lines (
                    refund_id, order_line_id, line_credit_excl_tax, quantity, status
                ) VALUES (?, ?, ?, ?, ?)
                "#
            )
            .bind(refund_id)
            .bind(line.order_line_id)
            .bind(line.line_credit_excl_tax)
            .bind(line.quantity)
            .bind(RefundLineStatus::Open.to_string())
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create refund line: {}", e)))?;

            line_ids.push(result.last_insert_id());
        }

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(refund.into_refund(refund_id, &line_ids, created_at))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Refund>> {
        let row = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT id, order_id, user_id, currency, total_credit_excl_tax, status, created_at
            FROM refunds
            WHERE id = ?
            "#
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch refund: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_order(&self, order_id: u64) -> Result<Vec<Refund>> {
        let rows = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT id, order_id, user_id, currency, total_credit_excl_tax, status, created_at
            FROM refunds
            WHERE order_id = ?
            ORDER BY id
            "#
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch refunds: {}", e)))?;

        let mut refunds = Vec::with_capacity(rows.len());
        for row in rows {
            refunds.push(self.hydrate(row).await?);
        }
        Ok(refunds)
    }

    async fn save_statuses(&self, refund: &Refund) -> Result<()> {
        let mut tx = self.pool.begin().await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        sqlx::query("UPDATE refunds SET status = ?, updated_at = ? WHERE id = ?")
            .bind(refund.status.to_string())
            .bind(Utc::now())
            .bind(refund.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to update refund status: {}", e)))?;

        for line in &refund.lines {
            sqlx::query("UPDATE refund_lines SET status = ? WHERE id = ? AND refund_id = ?")
                .bind(line.status.to_string())
                .bind(line.id)
                .bind(refund.id)
                .execute(tx.as_mut())
                .await
                .map_err(|e| {
                    AppError::Internal(format!("Failed to update refund line status: {}", e))
                })?;
        }

        tx.commit().await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }
}

/// Database row representation for refunds table
#[derive(sqlx::FromRow)]
struct RefundRow {
    id: u64,
    order_id: u64,
    user_id: u64,
    currency: String,
    total_credit_excl_tax: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl RefundRow {
    fn into_refund(self, lines: Vec<RefundLine>) -> Result<Refund> {
        Ok(Refund {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            currency: self.currency.parse().map_err(AppError::Internal)?,
            total_credit_excl_tax: self.total_credit_excl_tax,
            status: self.status.parse::<RefundStatus>().map_err(AppError::Internal)?,
            lines,
            created_at: self.created_at,
        })
    }
}

/// Database row representation for refund_lines table
#[derive(sqlx::FromRow)]
struct RefundLineRow {
    id: u64,
    order_line_id: u64,
    line_credit_excl_tax: Decimal,
    quantity: u32,
    status: String,
}

impl TryFrom<RefundLineRow> for RefundLine {
    type Error = AppError;

    fn try_from(row: RefundLineRow) -> Result<Self> {
        Ok(RefundLine {
            id: row.id,
            order_line_id: row.order_line_id,
            line_credit_excl_tax: row.line_credit_excl_tax,
            quantity: row.quantity,
            status: row.status.parse::<RefundLineStatus>().map_err(AppError::Internal)?,
        })
    }
}
