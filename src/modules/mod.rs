pub mod baskets;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod refunds;
