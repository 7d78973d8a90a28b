// Payments module: gateway adapters, signatures and the processor response ledger

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{NewPaymentSource, NewProcessorResponse, PaymentSource, ProcessorResponse};
pub use repositories::{MySqlProcessorResponseRepository, ProcessorResponseRepository};
pub use services::{
    BasketSnapshot, PaymentProcessor, Processor, ProcessorDecision, ProcessorRegistry,
};
