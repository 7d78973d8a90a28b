use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pipeline::{ensure_transition, transition, PipelineStatus};
use crate::core::{AppError, Currency, Result};
use crate::modules::baskets::{Basket, ProductClass};
use crate::modules::payments::NewPaymentSource;

pub const NO_SHIPPING_REQUIRED: &str = "No shipping required";

/// Order status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "Payment Error")]
    PaymentError,
    #[serde(rename = "Complete")]
    Complete,
    #[serde(rename = "Fulfillment Error")]
    FulfillmentError,
}

impl PipelineStatus for OrderStatus {
    const ENTITY: &'static str = "order";

    fn all() -> &'static [Self] {
        &[
            OrderStatus::Pending,
            OrderStatus::Open,
            OrderStatus::PaymentError,
            OrderStatus::Complete,
            OrderStatus::FulfillmentError,
        ]
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Open, OrderStatus::PaymentError],
            OrderStatus::Open => &[OrderStatus::Complete, OrderStatus::FulfillmentError],
            OrderStatus::FulfillmentError => &[OrderStatus::Complete],
            OrderStatus::PaymentError | OrderStatus::Complete => &[],
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Open => write!(f, "Open"),
            OrderStatus::PaymentError => write!(f, "Payment Error"),
            OrderStatus::Complete => write!(f, "Complete"),
            OrderStatus::FulfillmentError => write!(f, "Fulfillment Error"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OrderStatus::all()
            .iter()
            .copied()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Invalid order status: {}", s))
    }
}

/// Order line status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineStatus {
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "Complete")]
    Complete,
    #[serde(rename = "Fulfillment Configuration Error")]
    FulfillmentConfigurationError,
    #[serde(rename = "Fulfillment Network Error")]
    FulfillmentNetworkError,
    #[serde(rename = "Fulfillment Timeout Error")]
    FulfillmentTimeoutError,
    #[serde(rename = "Fulfillment Server Error")]
    FulfillmentServerError,
}

impl LineStatus {
    pub fn is_fulfillment_error(&self) -> bool {
        matches!(
            self,
            LineStatus::FulfillmentConfigurationError
                | LineStatus::FulfillmentNetworkError
                | LineStatus::FulfillmentTimeoutError
                | LineStatus::FulfillmentServerError
        )
    }
}

impl PipelineStatus for LineStatus {
    const ENTITY: &'static str = "order line";

    fn all() -> &'static [Self] {
        &[
            LineStatus::Open,
            LineStatus::Complete,
            LineStatus::FulfillmentConfigurationError,
            LineStatus::FulfillmentNetworkError,
            LineStatus::FulfillmentTimeoutError,
            LineStatus::FulfillmentServerError,
        ]
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            LineStatus::Open => &[
                LineStatus::Complete,
                LineStatus::FulfillmentConfigurationError,
                LineStatus::FulfillmentNetworkError,
                LineStatus::FulfillmentTimeoutError,
                LineStatus::FulfillmentServerError,
            ],
            LineStatus::FulfillmentConfigurationError
            | LineStatus::FulfillmentNetworkError
            | LineStatus::FulfillmentTimeoutError
            | LineStatus::FulfillmentServerError => &[LineStatus::Complete],
            LineStatus::Complete => &[],
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineStatus::Open => write!(f, "Open"),
            LineStatus::Complete => write!(f, "Complete"),
            LineStatus::FulfillmentConfigurationError => {
                write!(f, "Fulfillment Configuration Error")
            }
            LineStatus::FulfillmentNetworkError => write!(f, "Fulfillment Network Error"),
            LineStatus::FulfillmentTimeoutError => write!(f, "Fulfillment Timeout Error"),
            LineStatus::FulfillmentServerError => write!(f, "Fulfillment Server Error"),
        }
    }
}

impl std::str::FromStr for LineStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LineStatus::all()
            .iter()
            .copied()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Invalid order line status: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: u64,
    pub product_id: u64,
    pub title: String,
    pub product_class: ProductClass,
    pub course_id: Option<String>,
    pub seat_type: Option<String>,
    pub quantity: u32,
    pub line_price_incl_tax: Decimal,
    pub status: LineStatus,
}

impl OrderLine {
    pub fn set_status(&mut self, target: LineStatus) -> Result<()> {
        transition(&mut self.status, target)
    }

    pub fn available_statuses(&self) -> &'static [LineStatus] {
        self.status.allowed_transitions()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub number: String,
    pub basket_id: u64,
    pub user_id: u64,
    pub username: String,
    pub currency: Currency,
    pub total_incl_tax: Decimal,
    pub total_excl_tax: Decimal,
    pub shipping_incl_tax: Decimal,
    pub shipping_method: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Change the order status
    ///
    /// Moving to `Open` forces every line to `Open` as well. The order
    /// transition is validated first, so a rejected change leaves both the
    /// order and its lines untouched.
    pub fn set_status(&mut self, target: OrderStatus) -> Result<()> {
        ensure_transition(self.status, target)?;

        self.status = target;
        if target == OrderStatus::Open {
            for line in &mut self.lines {
                line.status = LineStatus::Open;
            }
        }

        Ok(())
    }

    pub fn available_statuses(&self) -> &'static [OrderStatus] {
        self.status.allowed_transitions()
    }

    pub fn line(&self, line_id: u64) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }
}

/// Line data carried from the basket into a new order
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub product_id: u64,
    pub title: String,
    pub product_class: ProductClass,
    pub course_id: Option<String>,
    pub seat_type: Option<String>,
    pub quantity: u32,
    pub line_price_incl_tax: Decimal,
}

/// Everything needed to place an order for a paid basket in one transaction
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    pub number: String,
    pub basket_id: u64,
    pub user_id: u64,
    pub username: String,
    pub currency: Currency,
    pub total_incl_tax: Decimal,
    pub lines: Vec<NewOrderLine>,
    pub source: NewPaymentSource,
}

impl OrderPlacement {
    /// Build a placement from basket state
    ///
    /// Totals always come from the basket, never from the gateway's reported
    /// amount. Shipping is zero for digital goods.
    pub fn from_basket(basket: &Basket, number: impl Into<String>, source: NewPaymentSource) -> Self {
        Self {
            number: number.into(),
            basket_id: basket.id,
            user_id: basket.owner.user_id,
            username: basket.owner.username.clone(),
            currency: basket.currency,
            total_incl_tax: basket.total_incl_tax(),
            lines: basket
                .lines
                .iter()
                .map(|line| NewOrderLine {
                    product_id: line.product_id,
                    title: line.title.clone(),
                    product_class: line.product_class,
                    course_id: line.course_id.clone(),
                    seat_type: line.seat_type.clone(),
                    quantity: line.quantity,
                    line_price_incl_tax: basket.currency.round(line.line_total()),
                })
                .collect(),
            source,
        }
    }

    /// Materialise the order once ids are assigned
    ///
    /// The order starts `Pending` and is opened, which cascades `Open` onto
    /// every line.
    pub fn into_order(
        &self,
        order_id: u64,
        line_ids: &[u64],
        created_at: DateTime<Utc>,
    ) -> Result<Order> {
        if self.lines.is_empty() {
            return Err(AppError::validation(format!(
                "Order {} must have at least one line",
                self.number
            )));
        }
        if line_ids.len() != self.lines.len() {
            return Err(AppError::internal(format!(
                "Order {} has {} lines but {} line ids",
                self.number,
                self.lines.len(),
                line_ids.len()
            )));
        }

        let mut order = Order {
            id: order_id,
            number: self.number.clone(),
            basket_id: self.basket_id,
            user_id: self.user_id,
            username: self.username.clone(),
            currency: self.currency,
            total_incl_tax: self.total_incl_tax,
            total_excl_tax: self.total_incl_tax,
            shipping_incl_tax: Decimal::ZERO,
            shipping_method: NO_SHIPPING_REQUIRED.to_string(),
            status: OrderStatus::Pending,
            lines: self
                .lines
                .iter()
                .zip(line_ids)
                .map(|(line, id)| OrderLine {
                    id: *id,
                    product_id: line.product_id,
                    title: line.title.clone(),
                    product_class: line.product_class,
                    course_id: line.course_id.clone(),
                    seat_type: line.seat_type.clone(),
                    quantity: line.quantity,
                    line_price_incl_tax: line.line_price_incl_tax,
                    status: LineStatus::Open,
                })
                .collect(),
            created_at,
        };

        order.set_status(OrderStatus::Open)?;
        Ok(order)
    }
}

/// Result of an order placement attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Created(Order),
    /// An order already exists for the number; carries that number
    Duplicate(String),
}
