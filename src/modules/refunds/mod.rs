// Refunds module: refund pipeline, credits and revocation

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{NewRefund, NewRefundLine, Refund, RefundLine, RefundLineStatus, RefundStatus};
pub use repositories::{MySqlRefundRepository, RefundRepository};
pub use services::{RefundAction, RefundService};
