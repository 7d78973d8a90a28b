mod basket;

pub use basket::{Basket, BasketLine, BasketOwner, BasketStatus, NewBasket, ProductClass};
