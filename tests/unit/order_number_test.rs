// Property-based tests for the basket id <-> order number mapping

use proptest::prelude::*;

use storefront_payments::core::{AppError, OrderNumberGenerator};

proptest! {
    #[test]
    fn test_order_number_reverses_to_basket_id(
        prefix in "[A-Z]{1,8}",
        offset in 0u64..1_000_000_000,
        basket_id in 0u64..1_000_000_000_000,
    ) {
        let generator = OrderNumberGenerator::new(prefix, offset);
        let number = generator.order_number(basket_id);
        prop_assert_eq!(generator.basket_id(&number).unwrap(), basket_id);
    }

    #[test]
    fn test_nonce_suffix_is_ignored(
        basket_id in 0u64..1_000_000_000,
        nonce in "[a-z0-9]{1,12}",
    ) {
        let generator = OrderNumberGenerator::new("EDX", 100_000);
        let reference = format!("{}-{}", generator.order_number(basket_id), nonce);
        prop_assert_eq!(generator.basket_id(&reference).unwrap(), basket_id);
    }

    #[test]
    fn test_distinct_baskets_get_distinct_numbers(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        prop_assume!(a != b);
        let generator = OrderNumberGenerator::default();
        prop_assert_ne!(generator.order_number(a), generator.order_number(b));
    }

    #[test]
    fn test_foreign_prefix_is_rejected(
        basket_id in 0u64..1_000_000,
        prefix in "[A-Z]{1,8}",
    ) {
        prop_assume!(prefix != "EDX");
        let ours = OrderNumberGenerator::default();
        let theirs = OrderNumberGenerator::new(prefix, 100_000);

        let result = ours.basket_id(&theirs.order_number(basket_id));
        prop_assert!(matches!(result, Err(AppError::InvalidBasket(_))));
    }
}

#[test]
fn test_zero_offset_numbers() {
    let generator = OrderNumberGenerator::new("ORDER", 0);
    assert_eq!(generator.order_number(42), "ORDER-42");
    assert_eq!(generator.basket_id("ORDER-42").unwrap(), 42);
}

#[test]
fn test_number_below_offset_is_rejected() {
    let generator = OrderNumberGenerator::default();
    assert!(matches!(
        generator.basket_id("EDX-42"),
        Err(AppError::InvalidBasket(_))
    ));
}
