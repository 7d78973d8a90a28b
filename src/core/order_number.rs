use super::error::{AppError, Result};

/// Default prefix for order numbers
pub const DEFAULT_ORDER_NUMBER_PREFIX: &str = "EDX";

/// Default offset added to basket ids
pub const DEFAULT_ORDER_NUMBER_OFFSET: u64 = 100_000;

/// Bidirectional mapping between basket ids and order numbers
///
/// An order number has the form `{PREFIX}-{basket_id + OFFSET}`. Gateways echo the
/// number back as their reference field, sometimes with an extra `-{nonce}`
/// suffix, so reversal only looks at the second segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumberGenerator {
    prefix: String,
    offset: u64,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            prefix: prefix.into(),
            offset,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Build the order number for a basket
    pub fn order_number(&self, basket_id: u64) -> String {
        format!("{}-{}", self.prefix, basket_id + self.offset)
    }

    /// Recover the basket id from an order number or gateway reference
    ///
    /// # Arguments
    /// * `reference` - Order number, optionally followed by `-{nonce}`
    ///
    /// # Returns
    /// * `Ok(basket_id)` when the reference carries this generator's prefix
    /// * `Err(AppError::InvalidBasket)` for anything else
    pub fn basket_id(&self, reference: &str) -> Result<u64> {
        let mut segments = reference.trim().split('-');

        let prefix = segments.next().unwrap_or_default();
        if prefix != self.prefix {
            return Err(AppError::invalid_basket(reference));
        }

        let number: u64 = segments
            .next()
            .and_then(|segment| segment.parse().ok())
            .ok_or_else(|| AppError::invalid_basket(reference))?;

        number
            .checked_sub(self.offset)
            .ok_or_else(|| AppError::invalid_basket(reference))
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER_NUMBER_PREFIX, DEFAULT_ORDER_NUMBER_OFFSET)
    }
}
