mod notification_handler;

pub use notification_handler::{
    CallbackOutcome, CallbackState, NotificationHandler, NotificationReport, PaymentStatus,
};
