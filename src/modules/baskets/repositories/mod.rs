mod basket_repository;

pub(crate) use basket_repository::find_basket_with_tx;
pub use basket_repository::{BasketRepository, MySqlBasketRepository};
