// Fixture factory for baskets, gateway configuration and signed callbacks

use chrono::Utc;
use rust_decimal::Decimal;

use storefront_payments::baskets::{Basket, BasketLine, BasketOwner, BasketStatus, ProductClass};
use storefront_payments::config::{FomopayConfig, PaymentsConfig, PayuConfig};
use storefront_payments::core::{Currency, OrderNumberGenerator};
use storefront_payments::payments::services::{
    Notification, PayuMd5, PayuSignatureKind, SignatureCodec, SortedParamsSha256,
};
use storefront_payments::payments::ProcessorRegistry;

pub const ORDER_PREFIX: &str = "ORDER";

pub const PAYU_API_KEY: &str = "4Vj8eK4rloUd272L48hsrarnUA";
pub const PAYU_MERCHANT_ID: &str = "508029";
pub const FOMOPAY_SHARED_KEY: &str = "fomopay-shared-key";

/// Order numbers of the form `ORDER-{basket_id}`
pub fn numbers() -> OrderNumberGenerator {
    OrderNumberGenerator::new(ORDER_PREFIX, 0)
}

pub fn payu_config() -> PayuConfig {
    PayuConfig {
        payment_page_url: "https://sandbox.checkout.payulatam.test/ppp-web-gateway-payu/".to_string(),
        merchant_id: PAYU_MERCHANT_ID.to_string(),
        account_id: "512321".to_string(),
        api_key: PAYU_API_KEY.to_string(),
        tax: "0".to_string(),
        tax_return_base: "0".to_string(),
        test: Some("1".to_string()),
        response_url: "https://shop.test/payment/payu/notify".to_string(),
        confirmation_url: "https://shop.test/payment/payu/notify".to_string(),
    }
}

pub fn fomopay_config() -> FomopayConfig {
    FomopayConfig {
        merchant: "merchant-1".to_string(),
        shared_key: FOMOPAY_SHARED_KEY.to_string(),
        api_url: "https://gateway.fomopay.test/api/v1/qr".to_string(),
        payment_page_url: "/payment/fomopay/qr".to_string(),
        callback_url: "https://shop.test/payment/fomopay/notify".to_string(),
        payment_type: "sale".to_string(),
        payment_timeout_secs: 1800,
        request_timeout_secs: 5,
    }
}

/// Registry with both gateways configured
pub fn registry() -> ProcessorRegistry {
    ProcessorRegistry::from_config(&PaymentsConfig {
        fomopay: Some(fomopay_config()),
        payu: Some(payu_config()),
    })
}

pub fn owner() -> BasketOwner {
    BasketOwner {
        user_id: 7,
        username: "learner".to_string(),
        email: "learner@example.com".to_string(),
        full_name: "Ada Learner".to_string(),
    }
}

/// A verified seat line with quantity one
pub fn seat_line(product_id: u64, unit_price: Decimal) -> BasketLine {
    BasketLine {
        product_id,
        title: format!("Verified seat {}", product_id),
        product_class: ProductClass::Seat,
        course_id: Some(format!("course-v1:edX+DemoX+{}", product_id)),
        seat_type: Some("verified".to_string()),
        quantity: 1,
        unit_price,
        discount: Decimal::ZERO,
    }
}

/// A pack of enrollment codes for one course run
pub fn enrollment_code_line(product_id: u64, quantity: u32, unit_price: Decimal) -> BasketLine {
    BasketLine {
        product_id,
        title: format!("Enrollment codes {}", product_id),
        product_class: ProductClass::EnrollmentCode,
        course_id: Some(format!("course-v1:edX+DemoX+{}", product_id)),
        seat_type: Some("verified".to_string()),
        quantity,
        unit_price,
        discount: Decimal::ZERO,
    }
}

pub fn basket(id: u64, status: BasketStatus, currency: Currency, lines: Vec<BasketLine>) -> Basket {
    Basket {
        id,
        owner: owner(),
        currency,
        status,
        lines,
        created_at: Utc::now(),
    }
}

/// Frozen basket holding one seat at `total`
pub fn frozen_basket(id: u64, currency: Currency, total: Decimal) -> Basket {
    basket(id, BasketStatus::Frozen, currency, vec![seat_line(1, total)])
}

fn fields(pairs: &[(&str, &str)]) -> Notification {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// PayU confirmation carrying a valid `sign`
pub fn payu_confirmation(reference: &str, state_pol: &str, value: &str, currency: &str) -> Notification {
    let mut notification = fields(&[
        ("reference_sale", reference),
        ("state_pol", state_pol),
        ("value", value),
        ("currency", currency),
        ("transaction_id", "4a1d1f3c-payu"),
        ("cc_number", "************0004"),
        ("lapPaymentMethod", "VISA"),
    ]);
    let codec = PayuMd5::new(PAYU_API_KEY, PAYU_MERCHANT_ID, PayuSignatureKind::Confirmation);
    let sign = codec.sign(&notification);
    notification.insert("sign".to_string(), sign);
    notification
}

/// FOMO Pay notification carrying a valid `signature`
pub fn fomopay_notification(reference: &str, result: &str, cash_amount: &str) -> Notification {
    let mut notification = fields(&[
        ("transaction", reference),
        ("result", result),
        ("cash_amount", cash_amount),
        ("cash_currency", "sgd"),
        ("payment_id", "fp-991"),
        ("nonce", "0f6c2b8e"),
    ]);
    let codec = SortedParamsSha256::new(FOMOPAY_SHARED_KEY);
    let signature = codec.sign(&notification);
    notification.insert("signature".to_string(), signature);
    notification
}
