mod payment_source;
mod processor_response;

pub use payment_source::{NewPaymentSource, PaymentSource};
pub use processor_response::{NewProcessorResponse, ProcessorResponse};
