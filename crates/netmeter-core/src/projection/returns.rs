use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::cash_flow::{CashFlowRow, PROJECTION_YEARS};
use crate::time_value::{self, BisectionConfig};
use crate::types::{percent_to_rate, round_money, Money, Percent};

/// Investment-return metrics for a projected cash-flow table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    /// First projection year whose cumulative cash flow is >= 0, or 25 when
    /// the investment is not recovered within the horizon
    pub payback_years: u32,
    /// Months into the payback year at which the cumulative flow crosses zero
    pub payback_months: u32,
    /// `(payback_years - 1) + payback_months / 12`, or 25 when not recovered
    pub payback_period_years: Decimal,
    pub paid_back: bool,
    /// IRR in percent, floored at 0
    pub irr_percent: Percent,
    /// Whether the bisection met its NPV tolerance
    pub irr_converged: bool,
    pub npv: Money,
}

/// A projected table plus the figures needed to score it, as read from a
/// JSON document by the CLI and the bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsInput {
    pub cash_flow: Vec<CashFlowRow>,
    pub investment_price: Money,
    #[serde(default = "default_discount_rate")]
    pub discount_rate_percent: Percent,
}

fn default_discount_rate() -> Percent {
    dec!(10)
}

impl ReturnsInput {
    pub fn metrics(&self) -> ReturnMetrics {
        compute_return_metrics(
            &self.cash_flow,
            self.investment_price,
            self.discount_rate_percent,
        )
    }
}

/// Payback, IRR and NPV for a cash-flow table produced by
/// [`project_cash_flow`](super::cash_flow::project_cash_flow).
///
/// Flows for years 1.. are `net_savings + investment`; the purchase is
/// represented by `investment_price` at t = 0. Never fails: IRR falls back to
/// the last bisection midpoint, NPV to zero for a discount rate at or below
/// -100%.
pub fn compute_return_metrics(
    rows: &[CashFlowRow],
    investment_price: Money,
    discount_rate_percent: Percent,
) -> ReturnMetrics {
    let (payback_years, payback_months, paid_back) = payback(rows);
    let payback_period_years = if paid_back {
        Decimal::from(payback_years.saturating_sub(1)) + Decimal::from(payback_months) / dec!(12)
    } else {
        Decimal::from(payback_years)
    };

    let mut series = Vec::with_capacity(rows.len());
    series.push(-investment_price);
    series.extend(rows.iter().skip(1).map(CashFlowRow::net_flow));

    let irr = time_value::irr_bisection(&series, &BisectionConfig::default());
    let irr_percent = (irr.rate * Decimal::ONE_HUNDRED).max(Decimal::ZERO);

    let npv = match time_value::npv(percent_to_rate(discount_rate_percent), &series) {
        Ok(value) => round_money(value),
        Err(e) => {
            log::warn!("NPV not computed: {e}");
            Decimal::ZERO
        }
    };

    ReturnMetrics {
        payback_years,
        payback_months,
        payback_period_years,
        paid_back,
        irr_percent,
        irr_converged: irr.converged,
        npv,
    }
}

/// `(year, months, paid_back)` of the first zero crossing of the cumulative
/// cash flow, interpolating months linearly inside the crossing year.
fn payback(rows: &[CashFlowRow]) -> (u32, u32, bool) {
    for pair in rows.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if curr.cumulative_cash_flow < Decimal::ZERO {
            continue;
        }

        let gained = curr
            .cumulative_cash_flow
            .saturating_sub(prev.cumulative_cash_flow);
        let months = if gained > Decimal::ZERO {
            prev.cumulative_cash_flow
                .abs()
                .checked_div(gained)
                .map_or(12, |fraction| {
                    fraction
                        .saturating_mul(dec!(12))
                        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                        .to_u32()
                        .unwrap_or(12)
                })
                .min(12)
        } else {
            0
        };
        return (curr.year, months, true);
    }

    (PROJECTION_YEARS, 0, false)
}
