pub mod fomopay;
pub mod payu;
pub mod processor;
pub mod qr_client;
pub mod registry;
pub mod signature;

pub use fomopay::Fomopay;
pub use payu::Payu;
pub use processor::{
    BasketSnapshot, CreditOutcome, HandledProcessorResponse, Notification, PaymentProcessor,
    Processor, ProcessorDecision, TransactionParameters,
};
pub use qr_client::{qr_request_form, FomopayQrClient, QrLinkProvider};
pub use registry::ProcessorRegistry;
pub use signature::{normalize_amount, Params, PayuMd5, PayuSignatureKind, SignatureCodec, SortedParamsSha256};
