pub mod currency;
pub mod error;
pub mod order_number;

pub use currency::Currency;
pub use error::{AppError, Result};
pub use order_number::OrderNumberGenerator;
