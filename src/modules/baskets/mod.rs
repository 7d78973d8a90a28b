// Baskets module

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Basket, BasketLine, BasketOwner, BasketStatus, NewBasket, ProductClass};
pub use repositories::{BasketRepository, MySqlBasketRepository};
pub use services::BasketService;
