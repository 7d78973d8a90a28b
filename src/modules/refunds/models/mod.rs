mod refund;

pub use refund::{
    NewRefund, NewRefundLine, Refund, RefundLine, RefundLineStatus, RefundStatus,
};
