use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currencies accepted by the configured payment processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar (2 decimal places)
    USD,
    /// Singapore Dollar (2 decimal places)
    SGD,
    /// Chinese Yuan (2 decimal places)
    CNY,
    /// Colombian Peso (2 decimal places)
    COP,
    /// Mexican Peso (2 decimal places)
    MXN,
    /// Peruvian Sol (2 decimal places)
    PEN,
    /// Chilean Peso (no decimal places)
    CLP,
}

impl Currency {
    /// Returns the decimal scale for this currency
    pub fn scale(&self) -> u32 {
        match self {
            Currency::CLP => 0,
            _ => 2,
        }
    }

    /// Rounds a decimal value to the appropriate scale for this currency
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.scale())
    }

    /// Validates that a decimal value has the correct scale for this currency
    pub fn validate_amount(&self, amount: Decimal) -> Result<(), String> {
        let scale = amount.normalize().scale();
        let expected_scale = self.scale();

        if scale > expected_scale {
            return Err(format!(
                "{} amounts must have at most {} decimal places, got {}",
                self, expected_scale, scale
            ));
        }

        if amount < Decimal::ZERO {
            return Err(format!("{} amount cannot be negative", self));
        }

        Ok(())
    }

    /// Formats an amount with exactly the currency's number of decimals (gateway wire format)
    pub fn format_amount(&self, amount: Decimal) -> String {
        format!("{:.width$}", self.round(amount), width = self.scale() as usize)
    }

    /// Lowercase ISO code, as some gateways expect it
    pub fn code_lower(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Currency::USD => "USD",
            Currency::SGD => "SGD",
            Currency::CNY => "CNY",
            Currency::COP => "COP",
            Currency::MXN => "MXN",
            Currency::PEN => "PEN",
            Currency::CLP => "CLP",
        };
        write!(f, "{}", code)
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "SGD" => Ok(Currency::SGD),
            "CNY" => Ok(Currency::CNY),
            "COP" => Ok(Currency::COP),
            "MXN" => Ok(Currency::MXN),
            "PEN" => Ok(Currency::PEN),
            "CLP" => Ok(Currency::CLP),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&str> for Currency {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}
