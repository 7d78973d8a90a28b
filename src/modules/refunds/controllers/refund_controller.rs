use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::modules::refunds::models::Refund;
use crate::modules::refunds::services::{RefundAction, RefundService};

#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    pub order_number: String,
    #[serde(default)]
    pub line_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRefundRequest {
    pub action: RefundAction,
}

#[derive(Debug, Serialize)]
pub struct ProcessRefundResponse {
    #[serde(flatten)]
    pub refund: Refund,
    /// Whether the action reached its goal status
    pub processed: bool,
}

/// Create a refund for an order
/// POST /api/refunds
///
/// Returns 201 with the new refund in a list, or 200 with an empty list when
/// nothing on the order is left to refund.
pub async fn create_refund(
    service: web::Data<Arc<RefundService>>,
    request: web::Json<CreateRefundRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let refund = service
        .create_for_order_number(&request.order_number, request.line_ids.as_deref())
        .await?;

    Ok(match refund {
        Some(refund) => HttpResponse::Created().json(vec![refund]),
        None => HttpResponse::Ok().json(Vec::<Refund>::new()),
    })
}

/// Approve or deny a refund
/// PUT /api/refunds/{id}/process
pub async fn process_refund(
    service: web::Data<Arc<RefundService>>,
    path: web::Path<u64>,
    request: web::Json<ProcessRefundRequest>,
) -> Result<HttpResponse> {
    let (refund, processed) = service.process(path.into_inner(), request.action).await?;

    Ok(HttpResponse::Ok().json(ProcessRefundResponse { refund, processed }))
}

/// Configure refund routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/refunds")
            .route("", web::post().to(create_refund))
            .route("/{id}/process", web::put().to(process_refund)),
    );
}
