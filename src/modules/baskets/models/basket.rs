// A basket is the unit a payment is taken for. Its id is encoded into the order
// number sent to the gateway, so a basket that has been offered for payment is
// frozen and never reopened; a retry after a decline gets a fresh basket.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Result};

/// Basket status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasketStatus {
    /// Editable by the owner
    Open,
    /// Offered to a gateway; contents locked
    Frozen,
    /// Abandoned after a failed payment, replaced by a new basket
    Closed,
    /// Converted into an order
    Submitted,
}

impl BasketStatus {
    /// Whether an order may still be placed for a basket in this status
    pub fn can_be_submitted(&self) -> bool {
        matches!(self, BasketStatus::Open | BasketStatus::Frozen)
    }
}

impl std::fmt::Display for BasketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BasketStatus::Open => write!(f, "Open"),
            BasketStatus::Frozen => write!(f, "Frozen"),
            BasketStatus::Closed => write!(f, "Closed"),
            BasketStatus::Submitted => write!(f, "Submitted"),
        }
    }
}

impl std::str::FromStr for BasketStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Open" => Ok(BasketStatus::Open),
            "Frozen" => Ok(BasketStatus::Frozen),
            "Closed" => Ok(BasketStatus::Closed),
            "Submitted" => Ok(BasketStatus::Submitted),
            _ => Err(format!("Invalid basket status: {}", s)),
        }
    }
}

/// What a product grants once paid for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductClass {
    /// Enrollment in a course run in the line's seat mode
    #[default]
    Seat,
    /// Codes issued to the buyer for redistribution
    EnrollmentCode,
    /// Right to enroll in any run of a course, identified by course uuid
    CourseEntitlement,
    Coupon,
}

impl std::fmt::Display for ProductClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductClass::Seat => write!(f, "Seat"),
            ProductClass::EnrollmentCode => write!(f, "Enrollment Code"),
            ProductClass::CourseEntitlement => write!(f, "Course Entitlement"),
            ProductClass::Coupon => write!(f, "Coupon"),
        }
    }
}

impl std::str::FromStr for ProductClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Seat" => Ok(ProductClass::Seat),
            "Enrollment Code" => Ok(ProductClass::EnrollmentCode),
            "Course Entitlement" => Ok(ProductClass::CourseEntitlement),
            "Coupon" => Ok(ProductClass::Coupon),
            _ => Err(format!("Invalid product class: {}", s)),
        }
    }
}

/// Snapshot of the purchasing user, taken from the accounts service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketOwner {
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

/// One product in a basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketLine {
    pub product_id: u64,
    pub title: String,
    #[serde(default)]
    pub product_class: ProductClass,
    /// Course run of a seat or enrollment code, or course uuid of an entitlement
    pub course_id: Option<String>,
    /// Certificate type of the seat (e.g. `verified`)
    pub seat_type: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Absolute discount applied to the whole line
    pub discount: Decimal,
}

impl BasketLine {
    /// Line price including tax, after discount
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price - self.discount
    }

    pub fn is_seat(&self) -> bool {
        self.product_class == ProductClass::Seat
            && self.seat_type.is_some()
            && self.course_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub id: u64,
    pub owner: BasketOwner,
    pub currency: Currency,
    pub status: BasketStatus,
    pub lines: Vec<BasketLine>,
    pub created_at: DateTime<Utc>,
}

impl Basket {
    /// Sum of line totals, rounded to the currency scale
    pub fn total_incl_tax(&self) -> Decimal {
        let total: Decimal = self.lines.iter().map(BasketLine::line_total).sum();
        self.currency.round(total)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Course ids of every line that carries one, in line order
    pub fn course_ids(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| line.course_id.as_deref())
            .collect()
    }

    /// First seat line, used as the gateway description
    pub fn first_seat(&self) -> Option<&BasketLine> {
        self.lines.iter().find(|line| line.is_seat())
    }

    /// Lock the basket for checkout
    ///
    /// Freezing an already frozen basket is a no-op.
    pub fn freeze(&mut self) -> Result<()> {
        match self.status {
            BasketStatus::Open => {
                if self.is_empty() {
                    return Err(AppError::validation(format!(
                        "Basket {} is empty and can not be checked out",
                        self.id
                    )));
                }
                self.status = BasketStatus::Frozen;
                Ok(())
            }
            BasketStatus::Frozen => Ok(()),
            other => Err(AppError::validation(format!(
                "Basket {} is {} and can not be checked out",
                self.id, other
            ))),
        }
    }

    /// Merge another basket's lines into this one without adding quantities
    ///
    /// A product already present keeps the larger of the two quantities.
    pub fn merge_lines(&mut self, other: &Basket) {
        merge_into(&mut self.lines, &other.lines);
    }
}

fn merge_into(lines: &mut Vec<BasketLine>, incoming: &[BasketLine]) {
    for line in incoming {
        match lines
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => existing.quantity = existing.quantity.max(line.quantity),
            None => lines.push(line.clone()),
        }
    }
}

/// Data needed to open a new basket
#[derive(Debug, Clone)]
pub struct NewBasket {
    pub owner: BasketOwner,
    pub currency: Currency,
    pub lines: Vec<BasketLine>,
}

impl NewBasket {
    /// Replacement for a basket whose payment failed
    ///
    /// Same owner and currency; the old lines are merged in without adding
    /// quantities.
    pub fn replacing(basket: &Basket) -> Self {
        let mut lines = Vec::with_capacity(basket.lines.len());
        merge_into(&mut lines, &basket.lines);

        Self {
            owner: basket.owner.clone(),
            currency: basket.currency,
            lines,
        }
    }
}
