use std::sync::Arc;

use actix_web::{http::header, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::config::CheckoutConfig;
use crate::core::{AppError, Result};
use crate::modules::baskets::BasketService;
use crate::modules::notifications::services::{
    CallbackOutcome, NotificationHandler, PaymentStatus,
};
use crate::modules::payments::services::fomopay::FOMOPAY;
use crate::modules::payments::services::payu::PAYU;
use crate::modules::payments::services::{qr_request_form, Params, QrLinkProvider};
use crate::modules::payments::{PaymentProcessor, Processor, ProcessorRegistry};

/// Response body for a handled callback
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub outcome: CallbackOutcome,
    pub order_number: Option<String>,
    pub ledger_entry_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionParametersRequest {
    pub basket_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrLinkResponse {
    pub qr_url: String,
    pub status_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    pub order_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,
}

/// Gateway server-to-server notification
/// POST /payment/{processor}/notify
///
/// 400 when the reference can not be mapped to a basket, 404 for an unknown
/// processor, otherwise 200 with the outcome. Business outcomes such as a
/// decline are not HTTP errors.
pub async fn notify(
    handler: web::Data<Arc<NotificationHandler>>,
    registry: web::Data<ProcessorRegistry>,
    checkout: web::Data<CheckoutConfig>,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse> {
    let processor = registry.require(&path.into_inner())?;
    let report = handler.handle(&processor, &form).await?;

    let receipt_url = match (&report.order_number, report.outcome.has_order()) {
        (Some(number), true) => Some(checkout.receipt_url(number)),
        _ => None,
    };

    Ok(HttpResponse::Ok().json(CallbackResponse {
        outcome: report.outcome,
        order_number: report.order_number,
        ledger_entry_id: report.ledger_entry_id,
        receipt_url,
    }))
}

/// Freeze a basket and return the signed parameters for the gateway
/// POST /payment/{processor}/parameters
pub async fn transaction_parameters(
    handler: web::Data<Arc<NotificationHandler>>,
    baskets: web::Data<Arc<BasketService>>,
    registry: web::Data<ProcessorRegistry>,
    path: web::Path<String>,
    request: web::Json<TransactionParametersRequest>,
) -> Result<HttpResponse> {
    let processor = registry.require(&path.into_inner())?;
    let basket = baskets.freeze(request.basket_id).await?;

    let order_number = handler.numbers().order_number(basket.id);
    let params = processor.build_transaction_parameters(&basket, &order_number)?;

    tracing::info!(
        processor = processor.name(),
        basket_id = basket.id,
        order_number = %order_number,
        "Transaction parameters issued"
    );

    Ok(HttpResponse::Ok().json(params))
}

/// Payer returning from the PayU checkout page
/// GET /payment/payu/notify
pub async fn payu_return(
    handler: web::Data<Arc<NotificationHandler>>,
    baskets: web::Data<Arc<BasketService>>,
    registry: web::Data<ProcessorRegistry>,
    checkout: web::Data<CheckoutConfig>,
    query: web::Query<Params>,
) -> Result<HttpResponse> {
    let processor = registry.require(PAYU)?;
    let reference_field = match processor.as_ref() {
        Processor::Payu(payu) => payu.return_reference_field(),
        _ => processor.reference_field(),
    };

    let reference = query.get(reference_field).map(String::as_str).unwrap_or_default();
    tracing::info!(
        transaction_id = query.get("transactionId").map(String::as_str).unwrap_or_default(),
        reference = reference,
        "Received PayU payer return"
    );

    let target = match handler.numbers().basket_id(reference) {
        Ok(basket_id) => match baskets.get(basket_id).await {
            Ok(basket) => checkout.receipt_url(&handler.numbers().order_number(basket.id)),
            Err(e) => {
                tracing::error!(basket_id = basket_id, error = %e, "Payer return for unknown basket");
                checkout.payment_error_url.clone()
            }
        },
        Err(_) => checkout.payment_error_url.clone(),
    };

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, target))
        .finish())
}

/// Request a WeChat QR link for signed FOMO Pay parameters
/// POST /payment/fomopay/qr
///
/// Only the signed fields are forwarded. A browser-supplied `api_url` is
/// dropped; the QR API endpoint comes from configuration.
pub async fn fomopay_qr(
    registry: web::Data<ProcessorRegistry>,
    qr: web::Data<Arc<dyn QrLinkProvider>>,
    form: web::Form<Params>,
) -> Result<HttpResponse> {
    let processor = registry.require(FOMOPAY)?;
    let order_id = form
        .get(processor.reference_field())
        .cloned()
        .ok_or_else(|| AppError::validation("transaction is required"))?;

    let qr_url = qr.qr_link(&qr_request_form(&form)).await?;

    Ok(HttpResponse::Ok().json(QrLinkResponse {
        qr_url,
        status_url: format!("/payment/fomopay/status?order_id={}", order_id),
    }))
}

/// Poll the payment status of a FOMO Pay order
/// GET /payment/fomopay/status?order_id=
pub async fn fomopay_status(
    handler: web::Data<Arc<NotificationHandler>>,
    registry: web::Data<ProcessorRegistry>,
    query: web::Query<PaymentStatusQuery>,
) -> Result<HttpResponse> {
    let processor = registry.require(FOMOPAY)?;
    let status = handler.payment_status(&processor, &query.order_id).await?;

    Ok(HttpResponse::Ok().json(PaymentStatusResponse { status }))
}

/// Configure payment callback routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payment")
            .route("/payu/notify", web::get().to(payu_return))
            .route("/fomopay/qr", web::post().to(fomopay_qr))
            .route("/fomopay/status", web::get().to(fomopay_status))
            .route("/{processor}/notify", web::post().to(notify))
            .route("/{processor}/parameters", web::post().to(transaction_parameters)),
    );
}
