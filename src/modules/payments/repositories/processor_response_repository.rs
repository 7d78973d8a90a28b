use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::payments::models::{NewProcessorResponse, ProcessorResponse};

/// Append-only audit ledger of gateway callbacks
///
/// Recording happens before the callback is interpreted and outside the order
/// placement transaction, so a failed or rolled back placement never loses
/// the raw response.
#[async_trait]
pub trait ProcessorResponseRepository: Send + Sync {
    async fn record(&self, entry: NewProcessorResponse) -> Result<ProcessorResponse>;

    /// Entries for a basket, oldest first
    async fn find_by_basket(&self, basket_id: u64) -> Result<Vec<ProcessorResponse>>;
}

/// MySQL-backed processor response ledger
pub struct MySqlProcessorResponseRepository {
    pool: MySqlPool,
}

impl MySqlProcessorResponseRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessorResponseRepository for MySqlProcessorResponseRepository {
    async fn record(&self, entry: NewProcessorResponse) -> Result<ProcessorResponse> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO processor_responses (
                processor_name, response, basket_id, transaction_id, created_at
            ) VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(&entry.processor_name)
        .bind(entry.response.to_string())
        .bind(entry.basket_id)
        .bind(&entry.transaction_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to record processor response: {}", e)))?;

        Ok(ProcessorResponse {
            id: result.last_insert_id(),
            processor_name: entry.processor_name,
            response: entry.response,
            basket_id: entry.basket_id,
            transaction_id: entry.transaction_id,
            created_at,
        })
    }

    async fn find_by_basket(&self, basket_id: u64) -> Result<Vec<ProcessorResponse>> {
        let rows = sqlx::query_as::<_, ProcessorResponseRow>(
            r#"
            SELECT id, processor_name, response, basket_id, transaction_id, created_at
            FROM processor_responses
            WHERE basket_id = ?
            ORDER BY id ASC
            "#
        )
        .bind(basket_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch processor responses: {}", e)))?;

        rows.into_iter().map(|row| row.try_into()).collect()
    }
}

/// Database row representation for processor_responses table
#[derive(sqlx::FromRow)]
struct ProcessorResponseRow {
    id: u64,
    processor_name: String,
    response: String,
    basket_id: Option<u64>,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProcessorResponseRow> for ProcessorResponse {
    type Error = AppError;

    fn try_from(row: ProcessorResponseRow) -> Result<Self> {
        Ok(ProcessorResponse {
            id: row.id,
            processor_name: row.processor_name,
            response: serde_json::from_str(&row.response)?,
            basket_id: row.basket_id,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
        })
    }
}
