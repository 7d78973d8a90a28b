// Shared fixtures for the unit, integration and contract suites.
//
// Every suite runs against the in-memory backend; gateways are exercised
// through real adapters with signed notifications, while fulfillment and the
// QR API are replaced by recording stubs.
//
// Usage:
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
//   use helpers::*;

#![allow(dead_code)]

pub mod test_app;
pub mod test_data;

pub use test_app::*;
pub use test_data::*;
