//! Storefront payment processing library
//!
//! Gateway adapters for FOMO Pay and PayU, the processor response ledger,
//! order and refund status pipelines, and the callback handler that turns a
//! paid basket into an order.

pub mod app;
pub mod config;
pub mod core;
pub mod infrastructure;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::baskets;
pub use modules::notifications;
pub use modules::orders;
pub use modules::payments;
pub use modules::refunds;
