pub mod dispatcher;
pub mod entitlement_client;
pub mod fulfillment_client;
pub mod fulfillment_service;

pub use dispatcher::{OrderDispatcher, SpawnedFulfillment};
pub use entitlement_client::EntitlementApiClient;
pub use fulfillment_client::{
    EnrollmentApiClient, FulfillmentClient, FulfillmentFailure, ProductFulfillment,
};
pub use fulfillment_service::FulfillmentService;
