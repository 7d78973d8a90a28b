// Notifications module: inbound gateway callbacks and payer returns

pub mod controllers;
pub mod services;

pub use services::{
    CallbackOutcome, CallbackState, NotificationHandler, NotificationReport, PaymentStatus,
};
