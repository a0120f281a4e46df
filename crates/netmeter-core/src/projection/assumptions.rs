use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{percent_to_rate, Percent};

/// Technical and economic assumptions behind the savings projection.
/// Every field is in percent except the replacement year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicAssumptions {
    /// Yearly tariff increase
    pub tariff_inflation_percent: Percent,
    /// Yearly loss of module efficiency
    pub efficiency_loss_percent_per_year: Percent,
    /// Discount rate used for NPV
    pub discount_rate_percent: Percent,
    /// Projection year in which the inverter is replaced (0 = never)
    pub inverter_replacement_year: u32,
    /// Replacement cost as a share of the investment price
    pub inverter_replacement_cost_percent: Percent,
}

impl Default for EconomicAssumptions {
    fn default() -> Self {
        Self {
            tariff_inflation_percent: dec!(6.5),
            efficiency_loss_percent_per_year: dec!(0.5),
            discount_rate_percent: dec!(10),
            inverter_replacement_year: 12,
            inverter_replacement_cost_percent: dec!(15),
        }
    }
}

impl EconomicAssumptions {
    /// Remaining module efficiency in `year` (1-based): `(1 - loss)^(year-1)`.
    pub fn degradation_factor(&self, year: u32) -> Decimal {
        let base = Decimal::ONE - percent_to_rate(self.efficiency_loss_percent_per_year);
        compound(base, year)
    }

    /// Tariff multiplier in `year` (1-based): `(1 + inflation)^(year-1)`.
    pub fn inflation_factor(&self, year: u32) -> Decimal {
        let base = Decimal::ONE + percent_to_rate(self.tariff_inflation_percent);
        compound(base, year)
    }
}

/// `base^(year-1)`, with a negative base read as 0 and growth saturating at
/// `Decimal::MAX` instead of overflowing.
fn compound(base: Decimal, year: u32) -> Decimal {
    base.max(Decimal::ZERO)
        .checked_powi(i64::from(year.saturating_sub(1)))
        .unwrap_or(Decimal::MAX)
}
