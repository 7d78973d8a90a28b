use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::payments::services::signature::Params;

/// Raw gateway callback as received, kept for audit
///
/// Entries are append-only. The basket reference is weak: it stays `None`
/// when the callback could not be matched to a basket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorResponse {
    pub id: u64,
    pub processor_name: String,
    pub response: serde_json::Value,
    pub basket_id: Option<u64>,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry to record
#[derive(Debug, Clone)]
pub struct NewProcessorResponse {
    pub processor_name: String,
    pub response: serde_json::Value,
    pub basket_id: Option<u64>,
    pub transaction_id: Option<String>,
}

impl NewProcessorResponse {
    /// Build an entry from callback form fields
    pub fn from_params(
        processor_name: &str,
        params: &Params,
        basket_id: Option<u64>,
        transaction_id: Option<String>,
    ) -> Self {
        let response = serde_json::Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        );

        Self {
            processor_name: processor_name.to_string(),
            response,
            basket_id,
            transaction_id: transaction_id.filter(|id| !id.is_empty()),
        }
    }
}
