use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::core::{AppError, Result};
use crate::modules::orders::models::Order;
use crate::modules::orders::repositories::OrderRepository;
use crate::modules::orders::services::FulfillmentService;
use crate::modules::payments::PaymentSource;

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub payment_sources: Vec<PaymentSource>,
}

/// Get order by number
/// GET /api/orders/{number}
pub async fn get_order(
    orders: web::Data<Arc<dyn OrderRepository>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let number = path.into_inner();
    let order = orders
        .find_by_number(&number)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {} not found", number)))?;
    let payment_sources = orders.find_payment_sources(order.id).await?;

    Ok(HttpResponse::Ok().json(OrderResponse {
        order,
        payment_sources,
    }))
}

/// Retry fulfillment of an order
/// POST /api/orders/{number}/fulfill
pub async fn fulfill_order(
    service: web::Data<Arc<FulfillmentService>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let order = service.fulfill_by_number(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(order))
}

/// Configure order routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/orders")
            .route("/{number}", web::get().to(get_order))
            .route("/{number}/fulfill", web::post().to(fulfill_order)),
    );
}
