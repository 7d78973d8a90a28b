mod refund_service;

pub use refund_service::{RefundAction, RefundService};
