// Gateway callback flow against the in-memory backend
//
// Covers order creation, idempotence, tamper and amount checks, recycling
// after declines, and concurrent duplicate callbacks.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;

use rust_decimal_macros::dec;

use helpers::*;
use storefront_payments::baskets::{BasketRepository, BasketStatus};
use storefront_payments::config::CheckoutConfig;
use storefront_payments::core::{AppError, Currency};
use storefront_payments::notifications::{CallbackOutcome, CallbackState, PaymentStatus};
use storefront_payments::orders::{LineStatus, OrderRepository, OrderStatus};
use storefront_payments::payments::services::fomopay::FOMOPAY;
use storefront_payments::payments::services::payu::PAYU;
use storefront_payments::payments::PaymentProcessor;

async fn seeded(basket_id: u64) -> TestApp {
    let app = TestApp::new();
    app.store
        .insert_basket(frozen_basket(basket_id, Currency::USD, dec!(150.00)))
        .await;
    app
}

#[tokio::test]
async fn test_accepted_notification_creates_order() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let notification = payu_confirmation("ORDER-42", "4", "150.00", "USD");
    let report = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::OrderCreated);
    assert_eq!(report.order_number.as_deref(), Some("ORDER-42"));
    assert_eq!(report.basket_id, Some(42));
    assert_eq!(
        report.trail,
        vec![
            CallbackState::Received,
            CallbackState::BasketResolved,
            CallbackState::ResponseRecorded,
            CallbackState::SignatureValidated,
            CallbackState::OutcomeClassified,
            CallbackState::OrderCreated,
        ]
    );

    let order = app.store.find_by_number("ORDER-42").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Open);
    assert_eq!(order.total_incl_tax, dec!(150.00));
    assert_eq!(order.shipping_incl_tax, dec!(0));
    assert_eq!(order.username, "learner");
    assert!(order.lines.iter().all(|line| line.status == LineStatus::Open));

    let sources = app.store.payment_sources().await;
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].amount_debited, dec!(150.00));
    assert_eq!(sources[0].currency, Currency::USD);
    assert_eq!(sources[0].source_type, PAYU);
    assert_eq!(sources[0].card_type, "VISA");

    let basket = BasketRepository::find_by_id(&app.store, 42).await.unwrap().unwrap();
    assert_eq!(basket.status, BasketStatus::Submitted);

    let dispatched = app.dispatcher.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].number, "ORDER-42");
}

#[tokio::test]
async fn test_resent_notification_is_duplicate() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();
    let notification = payu_confirmation("ORDER-42", "4", "150.00", "USD");

    let first = app.handler().handle(&payu, &notification).await.unwrap();
    let second = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(first.outcome, CallbackOutcome::OrderCreated);
    assert_eq!(second.outcome, CallbackOutcome::Duplicate);
    assert_eq!(second.order_number.as_deref(), Some("ORDER-42"));
    assert_ne!(first.ledger_entry_id, second.ledger_entry_id);

    assert_eq!(app.store.order_count().await, 1);
    assert_eq!(app.store.ledger_entries().await.len(), 2);
    assert_eq!(app.dispatcher.dispatched().len(), 1);
}

#[tokio::test]
async fn test_tampered_signature_creates_nothing() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let mut notification = payu_confirmation("ORDER-42", "4", "150.00", "USD");
    let sign = notification.get("sign").cloned().unwrap();
    let last = if sign.ends_with('0') { '1' } else { '0' };
    let tampered = format!("{}{}", &sign[..sign.len() - 1], last);
    notification.insert("sign".to_string(), tampered);

    let report = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::InvalidSignature);
    assert!(report.trail.contains(&CallbackState::InvalidSignature));
    assert!(!report.trail.contains(&CallbackState::SignatureValidated));
    assert_eq!(app.store.order_count().await, 0);
    assert!(app.store.payment_sources().await.is_empty());

    let ledger = app.store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].basket_id, Some(42));
}

#[tokio::test]
async fn test_amount_mismatch_is_partial_authorization() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let notification = payu_confirmation("ORDER-42", "4", "100.00", "USD");
    let report = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::PartialAuthorization);
    assert_eq!(report.trail.last(), Some(&CallbackState::Error));
    assert_eq!(app.store.order_count().await, 0);

    let basket = BasketRepository::find_by_id(&app.store, 42).await.unwrap().unwrap();
    assert_eq!(basket.status, BasketStatus::Frozen);
}

#[tokio::test]
async fn test_decline_recycles_basket_with_new_number() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let notification = payu_confirmation("ORDER-42", "6", "150.00", "USD");
    let report = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::Declined);
    assert_eq!(report.trail.last(), Some(&CallbackState::Declined));
    let new_id = report.recycled_basket_id.expect("basket should be recycled");
    assert_ne!(new_id, 42);
    assert_ne!(app.handler().numbers().order_number(new_id), "ORDER-42");

    let old = BasketRepository::find_by_id(&app.store, 42).await.unwrap().unwrap();
    assert_eq!(old.status, BasketStatus::Closed);

    let replacement = BasketRepository::find_by_id(&app.store, new_id).await.unwrap().unwrap();
    assert_eq!(replacement.status, BasketStatus::Open);
    assert_eq!(replacement.owner, old.owner);
    assert_eq!(replacement.lines, old.lines);

    // A late decline for the closed basket does not recycle again
    let again = app.handler().handle(&payu, &notification).await.unwrap();
    assert_eq!(again.outcome, CallbackOutcome::Declined);
    assert_eq!(again.recycled_basket_id, None);
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_fomopay_cancel_is_user_cancelled() {
    let app = TestApp::new();
    app.store
        .insert_basket(frozen_basket(42, Currency::SGD, dec!(150.00)))
        .await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();

    let notification = fomopay_notification("ORDER-42", "cancel", "150.00");
    let report = app.handler().handle(&fomopay, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::UserCancelled);
    assert!(report.recycled_basket_id.is_some());
}

#[tokio::test]
async fn test_fomopay_accepted_creates_order() {
    let app = TestApp::new();
    app.store
        .insert_basket(frozen_basket(42, Currency::SGD, dec!(150.00)))
        .await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();

    let notification = fomopay_notification("ORDER-42", "0", "150.00");
    let report = app.handler().handle(&fomopay, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::OrderCreated);
    let sources = app.store.payment_sources().await;
    assert_eq!(sources[0].reference, "fp-991");
    assert_eq!(sources[0].label, "WeChat QR Payment");
}

#[tokio::test]
async fn test_pending_and_unknown_states_are_distinct_outcomes() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let cases = [
        ("7", CallbackOutcome::AuthorizationPending),
        ("104", CallbackOutcome::GatewayError),
        ("99", CallbackOutcome::UnrecognizedDecision),
    ];
    for (state, expected) in cases {
        let notification = payu_confirmation("ORDER-42", state, "150.00", "USD");
        let report = app.handler().handle(&payu, &notification).await.unwrap();
        assert_eq!(report.outcome, expected, "state_pol {}", state);
        assert_eq!(report.recycled_basket_id, None);
    }

    assert_eq!(app.store.order_count().await, 0);
    assert_eq!(app.store.ledger_entries().await.len(), 3);
}

#[tokio::test]
async fn test_unknown_basket_is_recorded_without_reference() {
    let app = TestApp::new();
    let payu = app.state.registry.require(PAYU).unwrap();

    let notification = payu_confirmation("ORDER-77", "4", "150.00", "USD");
    let report = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::BasketNotFound);
    assert_eq!(report.basket_id, None);
    assert!(report.trail.contains(&CallbackState::BasketNotFound));

    let ledger = app.store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].basket_id, None);
    assert_eq!(ledger[0].response["reference_sale"], "ORDER-77");
}

#[tokio::test]
async fn test_unparseable_reference_is_recorded_then_rejected() {
    let app = TestApp::new();
    let payu = app.state.registry.require(PAYU).unwrap();

    let notification = payu_confirmation("not-an-order", "4", "150.00", "USD");
    let result = app.handler().handle(&payu, &notification).await;

    assert!(matches!(result, Err(AppError::InvalidBasket(_))));
    let ledger = app.store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].basket_id, None);
    assert_eq!(ledger[0].transaction_id.as_deref(), Some("4a1d1f3c-payu"));
}

#[tokio::test]
async fn test_failed_placement_keeps_only_ledger_entry() {
    let app = TestApp::new();
    // Frozen but empty: the order can not be built after the source is staged
    app.store
        .insert_basket(basket(42, BasketStatus::Frozen, Currency::USD, vec![]))
        .await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let notification = payu_confirmation("ORDER-42", "4", "0.00", "USD");
    let report = app.handler().handle(&payu, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::Error);
    assert_eq!(report.order_number, None);
    assert_eq!(report.basket_id, Some(42));
    assert_eq!(report.trail.last(), Some(&CallbackState::Error));
    assert!(report.trail.contains(&CallbackState::ResponseRecorded));

    assert_eq!(app.store.order_count().await, 0);
    assert!(app.store.payment_sources().await.is_empty());
    let ledger = app.store.ledger_entries().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].id, report.ledger_entry_id);
    assert!(app.dispatcher.dispatched().is_empty());

    let basket = BasketRepository::find_by_id(&app.store, 42).await.unwrap().unwrap();
    assert_eq!(basket.status, BasketStatus::Frozen);
}

#[tokio::test]
async fn test_accepted_payment_without_order_stops_processing() {
    let empty_basket = || basket(42, BasketStatus::Frozen, Currency::SGD, vec![]);
    let accepted = fomopay_notification("ORDER-42", "0", "0.00");

    // Within the grace period placement may still be under way
    let app = TestApp::new();
    app.store.insert_basket(empty_basket()).await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();
    app.handler().handle(&fomopay, &accepted).await.unwrap();
    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::Processing);

    // Once it is over, a missing order means the payment failed
    let app = TestApp::with_checkout(CheckoutConfig {
        placement_grace_secs: 0,
        ..CheckoutConfig::default()
    });
    app.store.insert_basket(empty_basket()).await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();
    let report = app.handler().handle(&fomopay, &accepted).await.unwrap();
    assert_eq!(report.outcome, CallbackOutcome::Error);

    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::Failed);
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_decline_with_other_amount_still_recycles() {
    let app = TestApp::new();
    app.store
        .insert_basket(frozen_basket(42, Currency::SGD, dec!(150.00)))
        .await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();

    let notification = fomopay_notification("ORDER-42", "decline", "0.01");
    let report = app.handler().handle(&fomopay, &notification).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::Declined);
    assert!(report.recycled_basket_id.is_some());
}

#[tokio::test]
async fn test_decline_after_acceptance_leaves_submitted_basket() {
    let app = seeded(42).await;
    let payu = app.state.registry.require(PAYU).unwrap();

    let accepted = payu_confirmation("ORDER-42", "4", "150.00", "USD");
    app.handler().handle(&payu, &accepted).await.unwrap();

    let declined = payu_confirmation("ORDER-42", "6", "150.00", "USD");
    let report = app.handler().handle(&payu, &declined).await.unwrap();

    assert_eq!(report.outcome, CallbackOutcome::Duplicate);
    assert_eq!(report.recycled_basket_id, None);
    let basket = BasketRepository::find_by_id(&app.store, 42).await.unwrap().unwrap();
    assert_eq!(basket.status, BasketStatus::Submitted);
}

#[tokio::test]
async fn test_concurrent_declines_recycle_once() {
    let app = Arc::new(seeded(42).await);
    let payu = app.state.registry.require(PAYU).unwrap();
    let notification = payu_confirmation("ORDER-42", "6", "150.00", "USD");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let app = Arc::clone(&app);
            let payu = Arc::clone(&payu);
            let notification = notification.clone();
            tokio::spawn(async move { app.handler().handle(&payu, &notification).await })
        })
        .collect();

    let mut recycled = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.outcome, CallbackOutcome::Declined);
        if report.recycled_basket_id.is_some() {
            recycled += 1;
        }
    }

    assert_eq!(recycled, 1);
    assert_eq!(app.store.basket_count().await, 2);
}

#[tokio::test]
async fn test_concurrent_duplicates_place_one_order() {
    let app = Arc::new(seeded(42).await);
    let payu = app.state.registry.require(PAYU).unwrap();
    let notification = payu_confirmation("ORDER-42", "4", "150.00", "USD");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = Arc::clone(&app);
            let payu = Arc::clone(&payu);
            let notification = notification.clone();
            tokio::spawn(async move { app.handler().handle(&payu, &notification).await })
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        match report.outcome {
            CallbackOutcome::OrderCreated => created += 1,
            CallbackOutcome::Duplicate => {
                duplicates += 1;
                assert_eq!(report.order_number.as_deref(), Some("ORDER-42"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(app.store.order_count().await, 1);
    assert_eq!(app.store.payment_sources().await.len(), 1);
    assert_eq!(app.store.ledger_entries().await.len(), 8);
}

#[tokio::test]
async fn test_payment_status_progression() {
    let app = TestApp::new();
    app.store
        .insert_basket(frozen_basket(42, Currency::SGD, dec!(150.00)))
        .await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();

    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::AwaitingPayment);

    let pending = fomopay_notification("ORDER-42", "review", "150.00");
    app.handler().handle(&fomopay, &pending).await.unwrap();
    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::Processing);

    let accepted = fomopay_notification("ORDER-42", "0", "150.00");
    app.handler().handle(&fomopay, &accepted).await.unwrap();
    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::Processing);

    let order = app.store.find_by_number("ORDER-42").await.unwrap().unwrap();
    app.fulfillment_service().fulfill_order(order).await.unwrap();
    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::Complete);
}

#[tokio::test]
async fn test_payment_status_after_failure_is_explicit() {
    let app = TestApp::new();
    app.store
        .insert_basket(frozen_basket(42, Currency::SGD, dec!(150.00)))
        .await;
    let fomopay = app.state.registry.require(FOMOPAY).unwrap();

    let error = fomopay_notification("ORDER-42", "error", "150.00");
    app.handler().handle(&fomopay, &error).await.unwrap();

    let status = app.handler().payment_status(&fomopay, "ORDER-42").await.unwrap();
    assert_eq!(status, PaymentStatus::Failed);

    let missing = app.handler().payment_status(&fomopay, "ORDER-99").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    assert_eq!(fomopay.name(), FOMOPAY);
}
