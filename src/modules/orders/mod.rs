// Orders module: order pipeline, placement and fulfillment

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{LineStatus, Order, OrderLine, OrderPlacement, OrderStatus, PlacementOutcome};
pub use repositories::{MySqlOrderRepository, OrderRepository};
pub use services::{
    EnrollmentApiClient, EntitlementApiClient, FulfillmentClient, FulfillmentFailure,
    FulfillmentService, OrderDispatcher, ProductFulfillment, SpawnedFulfillment,
};
