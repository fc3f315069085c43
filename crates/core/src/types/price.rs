//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Symbol shown in front of formatted amounts. The storefront sells in USD only.
pub const CURRENCY_SYMBOL: &str = "$";

/// A price in the storefront currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in dollars, not cents.
    pub amount: Decimal,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self { amount }
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{CURRENCY_SYMBOL}{:.2}", self.amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_two_decimals() {
        assert_eq!(Price::new(Decimal::new(1799, 1)).display(), "$179.90");
        assert_eq!(Price::new(Decimal::new(5, 0)).to_string(), "$5.00");
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(Price::default().display(), "$0.00");
    }
}
