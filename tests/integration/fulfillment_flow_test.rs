// Fulfillment of placed orders: line and order status progression

#[path = "../helpers/mod.rs"]
mod helpers;

use rust_decimal_macros::dec;

use helpers::*;
use storefront_payments::baskets::{BasketLine, BasketStatus, ProductClass};
use storefront_payments::core::{AppError, Currency};
use storefront_payments::orders::{
    FulfillmentFailure, LineStatus, Order, OrderRepository, OrderStatus,
};
use storefront_payments::payments::services::payu::PAYU;

/// Places an order for a two-seat basket through an accepted callback
async fn placed_order(app: &TestApp) -> Order {
    app.store
        .insert_basket(basket(
            42,
            BasketStatus::Frozen,
            Currency::USD,
            vec![seat_line(1, dec!(100.00)), seat_line(2, dec!(50.00))],
        ))
        .await;

    let payu = app.state.registry.require(PAYU).unwrap();
    let notification = payu_confirmation("ORDER-42", "4", "150.00", "USD");
    app.handler().handle(&payu, &notification).await.unwrap();

    app.store.find_by_number("ORDER-42").await.unwrap().unwrap()
}

#[tokio::test]
async fn test_all_lines_fulfilled_completes_order() {
    let app = TestApp::new();
    let order = placed_order(&app).await;

    let fulfilled = app.fulfillment_service().fulfill_order(order).await.unwrap();

    assert_eq!(fulfilled.status, OrderStatus::Complete);
    assert!(fulfilled.lines.iter().all(|line| line.status == LineStatus::Complete));
    assert_eq!(app.fulfillment.fulfilled().len(), 2);

    let stored = app.store.find_by_number("ORDER-42").await.unwrap().unwrap();
    assert_eq!(stored, fulfilled);
}

#[tokio::test]
async fn test_failed_line_moves_order_to_fulfillment_error() {
    let app = TestApp::new();
    let order = placed_order(&app).await;
    app.fulfillment
        .fail_next_fulfillment(FulfillmentFailure::Timeout("enrollment API".to_string()));

    let result = app.fulfillment_service().fulfill_order(order).await.unwrap();

    assert_eq!(result.status, OrderStatus::FulfillmentError);
    assert_eq!(result.lines[0].status, LineStatus::FulfillmentTimeoutError);
    assert_eq!(result.lines[1].status, LineStatus::Complete);

    let stored = app.store.find_by_number("ORDER-42").await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::FulfillmentError);
}

#[tokio::test]
async fn test_retry_only_attempts_unfinished_lines() {
    let app = TestApp::new();
    let order = placed_order(&app).await;
    let first_line = order.lines[0].id;
    let second_line = order.lines[1].id;
    app.fulfillment
        .fail_next_fulfillment(FulfillmentFailure::Network("connection refused".to_string()));

    app.fulfillment_service().fulfill_order(order).await.unwrap();
    assert_eq!(app.fulfillment.fulfilled(), vec![second_line]);

    let retried = app.fulfillment_service().fulfill_by_number("ORDER-42").await.unwrap();

    assert_eq!(retried.status, OrderStatus::Complete);
    assert_eq!(app.fulfillment.fulfilled(), vec![second_line, first_line]);
}

#[tokio::test]
async fn test_repeated_failure_keeps_first_error() {
    let app = TestApp::new();
    let order = placed_order(&app).await;
    app.fulfillment
        .fail_next_fulfillment(FulfillmentFailure::Server("500".to_string()));

    app.fulfillment_service().fulfill_order(order).await.unwrap();

    app.fulfillment
        .fail_next_fulfillment(FulfillmentFailure::Timeout("slow".to_string()));
    let retried = app.fulfillment_service().fulfill_by_number("ORDER-42").await.unwrap();

    assert_eq!(retried.status, OrderStatus::FulfillmentError);
    assert_eq!(retried.lines[0].status, LineStatus::FulfillmentServerError);
}

#[tokio::test]
async fn test_complete_order_is_left_alone() {
    let app = TestApp::new();
    let order = placed_order(&app).await;
    let complete = app.fulfillment_service().fulfill_order(order).await.unwrap();

    let again = app.fulfillment_service().fulfill_order(complete.clone()).await.unwrap();

    assert_eq!(again, complete);
    assert_eq!(app.fulfillment.fulfilled().len(), 2);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = TestApp::new();
    let result = app.fulfillment_service().fulfill_by_number("ORDER-1").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_failure_kinds_map_to_line_statuses() {
    let cases = [
        (
            FulfillmentFailure::Configuration("no course".to_string()),
            LineStatus::FulfillmentConfigurationError,
        ),
        (
            FulfillmentFailure::Network("reset".to_string()),
            LineStatus::FulfillmentNetworkError,
        ),
        (
            FulfillmentFailure::Timeout("slow".to_string()),
            LineStatus::FulfillmentTimeoutError,
        ),
        (
            FulfillmentFailure::Server("503".to_string()),
            LineStatus::FulfillmentServerError,
        ),
    ];

    for (failure, expected) in cases {
        let app = TestApp::new();
        let order = placed_order(&app).await;
        app.fulfillment.fail_next_fulfillment(failure);

        let result = app.fulfillment_service().fulfill_order(order).await.unwrap();
        assert_eq!(result.lines[0].status, expected);
    }
}

#[tokio::test]
async fn test_each_product_class_takes_its_own_path() {
    let app = TestApp::new();
    let entitlement = BasketLine {
        product_class: ProductClass::CourseEntitlement,
        course_id: Some("8a3c6e1f-2b4d-4c1e-9f7a-5d2e0b1c3a44".to_string()),
        ..seat_line(3, dec!(30.00))
    };
    app.store
        .insert_basket(basket(
            42,
            BasketStatus::Frozen,
            Currency::USD,
            vec![seat_line(1, dec!(100.00)), enrollment_code_line(2, 2, dec!(10.00)), entitlement],
        ))
        .await;
    let payu = app.state.registry.require(PAYU).unwrap();
    let notification = payu_confirmation("ORDER-42", "4", "150.00", "USD");
    app.handler().handle(&payu, &notification).await.unwrap();
    let order = app.store.find_by_number("ORDER-42").await.unwrap().unwrap();

    let fulfilled = app.fulfillment_service().fulfill_order(order).await.unwrap();

    assert_eq!(fulfilled.status, OrderStatus::Complete);
    assert!(fulfilled.lines.iter().all(|line| line.status == LineStatus::Complete));
    assert_eq!(fulfilled.lines[1].product_class, ProductClass::EnrollmentCode);
    assert_eq!(app.fulfillment.fulfilled(), vec![fulfilled.lines[0].id]);
    assert_eq!(app.entitlements.fulfilled(), vec![fulfilled.lines[2].id]);
}
