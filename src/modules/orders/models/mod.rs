mod order;
pub mod pipeline;

pub use order::{
    LineStatus, NewOrderLine, Order, OrderLine, OrderPlacement, OrderStatus, PlacementOutcome,
    NO_SHIPPING_REQUIRED,
};
pub use pipeline::{ensure_transition, transition, PipelineStatus};
