// Exhaustive checks of the declared status pipelines
//
// Every (from, to) pair is attempted: legal moves apply, illegal ones fail
// with IllegalTransition and leave the status where it was.

use chrono::Utc;
use rust_decimal_macros::dec;

use storefront_payments::baskets::ProductClass;
use storefront_payments::core::{AppError, Currency};
use storefront_payments::orders::models::{
    transition, LineStatus, Order, OrderLine, OrderStatus, PipelineStatus, NO_SHIPPING_REQUIRED,
};
use storefront_payments::refunds::{RefundLineStatus, RefundStatus};

fn assert_pipeline<S: PipelineStatus + std::fmt::Debug>() {
    for from in S::all() {
        for to in S::all() {
            let mut status = *from;
            let result = transition(&mut status, *to);

            if from.allowed_transitions().contains(to) {
                assert!(result.is_ok(), "{} -> {} should be allowed", from, to);
                assert_eq!(status, *to);
            } else {
                match result {
                    Err(AppError::IllegalTransition { entity, from: f, to: t }) => {
                        assert_eq!(entity, S::ENTITY);
                        assert_eq!(f, from.to_string());
                        assert_eq!(t, to.to_string());
                    }
                    other => panic!("{} -> {} should be illegal, got {:?}", from, to, other),
                }
                assert_eq!(status, *from, "rejected transition must not mutate");
            }
        }
    }
}

#[test]
fn test_order_pipeline_is_enforced() {
    assert_pipeline::<OrderStatus>();
}

#[test]
fn test_line_pipeline_is_enforced() {
    assert_pipeline::<LineStatus>();
}

#[test]
fn test_refund_pipeline_is_enforced() {
    assert_pipeline::<RefundStatus>();
}

#[test]
fn test_refund_line_pipeline_is_enforced() {
    assert_pipeline::<RefundLineStatus>();
}

#[test]
fn test_order_table() {
    use OrderStatus::*;
    assert_eq!(Pending.allowed_transitions(), &[Open, PaymentError]);
    assert_eq!(Open.allowed_transitions(), &[Complete, FulfillmentError]);
    assert_eq!(FulfillmentError.allowed_transitions(), &[Complete]);
    assert!(PaymentError.is_terminal());
    assert!(Complete.is_terminal());
}

#[test]
fn test_refund_table() {
    use RefundStatus::*;
    assert_eq!(Open.allowed_transitions(), &[Denied, PaymentRefundError, PaymentRefunded]);
    assert_eq!(
        PaymentRefundError.allowed_transitions(),
        &[PaymentRefunded, PaymentRefundError]
    );
    assert_eq!(PaymentRefunded.allowed_transitions(), &[RevocationError, Complete]);
    assert_eq!(RevocationError.allowed_transitions(), &[RevocationError, Complete]);
    assert!(Denied.is_terminal());
    assert!(Complete.is_terminal());
}

#[test]
fn test_terminal_statuses_never_leave() {
    for status in LineStatus::all().iter().filter(|s| s.is_terminal()) {
        assert_eq!(*status, LineStatus::Complete);
    }
    for status in RefundLineStatus::all().iter().filter(|s| s.is_terminal()) {
        assert!(matches!(status, RefundLineStatus::Denied | RefundLineStatus::Complete));
    }
}

fn order(status: OrderStatus, line_statuses: &[LineStatus]) -> Order {
    Order {
        id: 1,
        number: "ORDER-42".to_string(),
        basket_id: 42,
        user_id: 7,
        username: "learner".to_string(),
        currency: Currency::USD,
        total_incl_tax: dec!(150.00),
        total_excl_tax: dec!(150.00),
        shipping_incl_tax: dec!(0),
        shipping_method: NO_SHIPPING_REQUIRED.to_string(),
        status,
        lines: line_statuses
            .iter()
            .enumerate()
            .map(|(idx, status)| OrderLine {
                id: idx as u64 + 1,
                product_id: idx as u64 + 1,
                title: "Verified seat".to_string(),
                product_class: ProductClass::Seat,
                course_id: Some("course-v1:edX+DemoX+1T2024".to_string()),
                seat_type: Some("verified".to_string()),
                quantity: 1,
                line_price_incl_tax: dec!(75.00),
                status: *status,
            })
            .collect(),
        created_at: Utc::now(),
    }
}

#[test]
fn test_open_cascade_is_all_or_nothing() {
    let mut pending = order(
        OrderStatus::Pending,
        &[LineStatus::Complete, LineStatus::FulfillmentNetworkError],
    );
    pending.set_status(OrderStatus::Open).unwrap();
    assert!(pending.lines.iter().all(|line| line.status == LineStatus::Open));

    for from in OrderStatus::all().iter().filter(|s| !s.can_transition_to(OrderStatus::Open)) {
        let mut o = order(*from, &[LineStatus::Complete, LineStatus::FulfillmentServerError]);
        let before = o.clone();
        assert!(o.set_status(OrderStatus::Open).is_err());
        assert_eq!(o, before);
    }
}
