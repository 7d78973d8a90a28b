use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Currency, Result};
use crate::modules::orders::models::{transition, PipelineStatus};

/// Refund status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefundStatus {
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "Denied")]
    Denied,
    #[serde(rename = "Payment Refund Error")]
    PaymentRefundError,
    #[serde(rename = "Payment Refunded")]
    PaymentRefunded,
    #[serde(rename = "Revocation Error")]
    RevocationError,
    #[serde(rename = "Complete")]
    Complete,
}

impl PipelineStatus for RefundStatus {
    const ENTITY: &'static str = "refund";

    fn all() -> &'static [Self] {
        &[
            RefundStatus::Open,
            RefundStatus::Denied,
            RefundStatus::PaymentRefundError,
            RefundStatus::PaymentRefunded,
            RefundStatus::RevocationError,
            RefundStatus::Complete,
        ]
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            RefundStatus::Open => &[
                RefundStatus::Denied,
                RefundStatus::PaymentRefundError,
                RefundStatus::PaymentRefunded,
            ],
            RefundStatus::PaymentRefundError => {
                &[RefundStatus::PaymentRefunded, RefundStatus::PaymentRefundError]
            }
            RefundStatus::PaymentRefunded => {
                &[RefundStatus::RevocationError, RefundStatus::Complete]
            }
            RefundStatus::RevocationError => {
                &[RefundStatus::RevocationError, RefundStatus::Complete]
            }
            RefundStatus::Denied | RefundStatus::Complete => &[],
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatus::Open => write!(f, "Open"),
            RefundStatus::Denied => write!(f, "Denied"),
            RefundStatus::PaymentRefundError => write!(f, "Payment Refund Error"),
            RefundStatus::PaymentRefunded => write!(f, "Payment Refunded"),
            RefundStatus::RevocationError => write!(f, "Revocation Error"),
            RefundStatus::Complete => write!(f, "Complete"),
        }
    }
}

impl std::str::FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RefundStatus::all()
            .iter()
            .copied()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Invalid refund status: {}", s))
    }
}

/// Refund line status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefundLineStatus {
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "Denied")]
    Denied,
    #[serde(rename = "Revocation Error")]
    RevocationError,
    #[serde(rename = "Complete")]
    Complete,
}

impl PipelineStatus for RefundLineStatus {
    const ENTITY: &'static str = "refund line";

    fn all() -> &'static [Self] {
        &[
            RefundLineStatus::Open,
            RefundLineStatus::Denied,
            RefundLineStatus::RevocationError,
            RefundLineStatus::Complete,
        ]
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            RefundLineStatus::Open => &[
                RefundLineStatus::Denied,
                RefundLineStatus::RevocationError,
                RefundLineStatus::Complete,
            ],
            RefundLineStatus::RevocationError => {
                &[RefundLineStatus::RevocationError, RefundLineStatus::Complete]
            }
            RefundLineStatus::Denied | RefundLineStatus::Complete => &[],
        }
    }
}

impl std::fmt::Display for RefundLineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundLineStatus::Open => write!(f, "Open"),
            RefundLineStatus::Denied => write!(f, "Denied"),
            RefundLineStatus::RevocationError => write!(f, "Revocation Error"),
            RefundLineStatus::Complete => write!(f, "Complete"),
        }
    }
}

impl std::str::FromStr for RefundLineStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RefundLineStatus::all()
            .iter()
            .copied()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Invalid refund line status: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundLine {
    pub id: u64,
    pub order_line_id: u64,
    pub line_credit_excl_tax: Decimal,
    pub quantity: u32,
    pub status: RefundLineStatus,
}

impl RefundLine {
    pub fn set_status(&mut self, target: RefundLineStatus) -> Result<()> {
        transition(&mut self.status, target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: u64,
    pub order_id: u64,
    pub user_id: u64,
    pub currency: Currency,
    pub total_credit_excl_tax: Decimal,
    pub status: RefundStatus,
    pub lines: Vec<RefundLine>,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    pub fn set_status(&mut self, target: RefundStatus) -> Result<()> {
        transition(&mut self.status, target)
    }

    pub fn available_statuses(&self) -> &'static [RefundStatus] {
        self.status.allowed_transitions()
    }

    /// Approval can start or resume from these statuses
    pub fn can_approve(&self) -> bool {
        matches!(
            self.status,
            RefundStatus::Open
                | RefundStatus::PaymentRefundError
                | RefundStatus::PaymentRefunded
                | RefundStatus::RevocationError
        )
    }

    pub fn can_deny(&self) -> bool {
        self.status == RefundStatus::Open
    }

    pub fn num_items(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// Refund line to create
#[derive(Debug, Clone, PartialEq)]
pub struct NewRefundLine {
    pub order_line_id: u64,
    pub line_credit_excl_tax: Decimal,
    pub quantity: u32,
}

/// Refund to create, always starting `Open`
#[derive(Debug, Clone, PartialEq)]
pub struct NewRefund {
    pub order_id: u64,
    pub user_id: u64,
    pub currency: Currency,
    pub lines: Vec<NewRefundLine>,
}

impl NewRefund {
    pub fn total_credit_excl_tax(&self) -> Decimal {
        self.lines.iter().map(|line| line.line_credit_excl_tax).sum()
    }

    pub fn into_refund(self, id: u64, line_ids: &[u64], created_at: DateTime<Utc>) -> Refund {
        let total_credit_excl_tax = self.total_credit_excl_tax();
        Refund {
            id,
            order_id: self.order_id,
            user_id: self.user_id,
            currency: self.currency,
            total_credit_excl_tax,
            status: RefundStatus::Open,
            lines: self
                .lines
                .into_iter()
                .zip(line_ids)
                .map(|(line, line_id)| RefundLine {
                    id: *line_id,
                    order_line_id: line.order_line_id,
                    line_credit_excl_tax: line.line_credit_excl_tax,
                    quantity: line.quantity,
                    status: RefundLineStatus::Open,
                })
                .collect(),
            created_at,
        }
    }
}
