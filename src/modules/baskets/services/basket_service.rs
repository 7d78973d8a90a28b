use std::sync::Arc;

use crate::core::{AppError, Result};
use crate::modules::baskets::models::{Basket, BasketStatus, NewBasket};
use crate::modules::baskets::repositories::BasketRepository;

/// Service for basket checkout logic
pub struct BasketService {
    basket_repo: Arc<dyn BasketRepository>,
}

impl BasketService {
    pub fn new(basket_repo: Arc<dyn BasketRepository>) -> Self {
        Self { basket_repo }
    }

    pub async fn open(&self, basket: NewBasket) -> Result<Basket> {
        if basket.lines.is_empty() {
            return Err(AppError::validation("Basket must have at least one line"));
        }
        for line in &basket.lines {
            if line.quantity == 0 {
                return Err(AppError::validation(format!(
                    "Line for product {} must have a positive quantity",
                    line.product_id
                )));
            }
            basket
                .currency
                .validate_amount(line.unit_price)
                .map_err(AppError::Validation)?;
        }

        self.basket_repo.create(basket).await
    }

    pub async fn get(&self, id: u64) -> Result<Basket> {
        self.basket_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Basket {} not found", id)))
    }

    /// Freeze a basket before its parameters are handed to a gateway
    pub async fn freeze(&self, id: u64) -> Result<Basket> {
        let mut basket = self.get(id).await?;

        if basket.status == BasketStatus::Frozen {
            return Ok(basket);
        }

        basket.freeze()?;
        self.basket_repo.update_status(id, basket.status).await?;

        tracing::info!(basket_id = id, "Basket frozen for checkout");

        Ok(basket)
    }
}
