use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::assumptions::EconomicAssumptions;
use crate::types::{percent_to_rate, round_money, Kwh, Money};

/// Years covered by the projection (row 0 is the purchase itself).
pub const PROJECTION_YEARS: u32 = 25;

/// Share of the tariff attributed to the wire-usage component (Fio B).
pub const WIRE_COMPONENT_SHARE: Decimal = dec!(0.28);

/// Flat share of the wire component charged on compensated energy. A preview
/// simplification of the phased net-metering schedule.
pub const WIRE_FEE_CHARGED_SHARE: Decimal = dec!(0.15);

const MONTHS_PER_YEAR: u32 = 12;

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Everything the projector needs; the installment is computed upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowInput {
    pub investment_price: Money,
    #[serde(default)]
    pub assumptions: EconomicAssumptions,
    /// Monthly installment (0 when paid upfront)
    #[serde(default)]
    pub installment_amount: Money,
    /// Number of monthly installments (0 when paid upfront)
    #[serde(default)]
    pub num_installments: u32,
    /// Paid at signature when financed; ignored when `num_installments` is 0
    #[serde(default)]
    pub down_payment: Money,
    /// Expected first-year generation (kWh/year)
    pub base_annual_generation_kwh: Kwh,
    /// Current tariff (R$/kWh)
    pub base_tariff_rate: Money,
}

/// One year of the savings projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRow {
    pub year: u32,
    pub generation_kwh: Kwh,
    pub tariff_rate: Money,
    pub gross_savings: Money,
    pub wire_fee_cost: Money,
    pub net_savings: Money,
    /// Inverter replacement
    pub extra_cost: Money,
    /// Installments paid during the year
    pub financing_cost: Money,
    /// Outflow for the year, always <= 0
    pub investment: Money,
    pub cumulative_cash_flow: Money,
}

impl CashFlowRow {
    /// Net flow of the year: savings plus (negative) investment.
    pub fn net_flow(&self) -> Money {
        self.net_savings.saturating_add(self.investment)
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Build the year 0..=25 savings table.
///
/// Each figure is rounded to cents as soon as it is produced and the rounded
/// value feeds the next step, so results match the proposal preview to the
/// cent. The function is total: degenerate inputs simply yield zero rows and
/// figures beyond the Decimal range saturate at its bounds.
pub fn project_cash_flow(input: &CashFlowInput) -> Vec<CashFlowRow> {
    let mut rows = Vec::with_capacity(PROJECTION_YEARS as usize + 1);

    let upfront = if input.num_installments > 0 {
        input.down_payment
    } else {
        input.investment_price
    };
    let initial = round_money(-upfront);

    rows.push(CashFlowRow {
        year: 0,
        generation_kwh: Decimal::ZERO,
        tariff_rate: input.base_tariff_rate,
        gross_savings: Decimal::ZERO,
        wire_fee_cost: Decimal::ZERO,
        net_savings: Decimal::ZERO,
        extra_cost: Decimal::ZERO,
        financing_cost: Decimal::ZERO,
        investment: initial,
        cumulative_cash_flow: initial,
    });

    let mut cumulative = initial;
    for year in 1..=PROJECTION_YEARS {
        let row = project_year(input, year, cumulative);
        cumulative = row.cumulative_cash_flow;
        rows.push(row);
    }

    rows
}

fn project_year(input: &CashFlowInput, year: u32, prior_cumulative: Money) -> CashFlowRow {
    let a = &input.assumptions;

    let tariff_rate = round_money(input.base_tariff_rate.saturating_mul(a.inflation_factor(year)));
    let generation_kwh =
        round_money(input.base_annual_generation_kwh.saturating_mul(a.degradation_factor(year)));
    let energy_value = generation_kwh.saturating_mul(tariff_rate);
    let gross_savings = round_money(energy_value);
    let wire_fee_cost = round_money(
        energy_value
            .saturating_mul(WIRE_COMPONENT_SHARE)
            .saturating_mul(WIRE_FEE_CHARGED_SHARE),
    );
    let net_savings = round_money(gross_savings.saturating_sub(wire_fee_cost));

    let extra_cost = if year == a.inverter_replacement_year {
        round_money(
            input
                .investment_price
                .saturating_mul(percent_to_rate(a.inverter_replacement_cost_percent)),
        )
    } else {
        Decimal::ZERO
    };

    let financing_cost = round_money(
        input
            .installment_amount
            .saturating_mul(Decimal::from(installments_due(input.num_installments, year))),
    );
    let investment = -extra_cost.saturating_add(financing_cost);

    CashFlowRow {
        year,
        generation_kwh,
        tariff_rate,
        gross_savings,
        wire_fee_cost,
        net_savings,
        extra_cost,
        financing_cost,
        investment,
        cumulative_cash_flow: prior_cumulative
            .saturating_add(net_savings)
            .saturating_add(investment),
    }
}

/// Installments still outstanding in `year`, at most 12.
fn installments_due(num_installments: u32, year: u32) -> u32 {
    let already_paid = (year - 1) * MONTHS_PER_YEAR;
    num_installments
        .saturating_sub(already_paid)
        .min(MONTHS_PER_YEAR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cash_purchase() -> CashFlowInput {
        CashFlowInput {
            investment_price: dec!(25_000),
            assumptions: EconomicAssumptions {
                tariff_inflation_percent: dec!(6.5),
                efficiency_loss_percent_per_year: dec!(0.5),
                discount_rate_percent: dec!(10),
                inverter_replacement_year: 12,
                inverter_replacement_cost_percent: dec!(15),
            },
            installment_amount: Decimal::ZERO,
            num_installments: 0,
            down_payment: Decimal::ZERO,
            base_annual_generation_kwh: dec!(6000),
            base_tariff_rate: dec!(1.10),
        }
    }

    #[test]
    fn test_produces_26_rows() {
        let rows = project_cash_flow(&cash_purchase());
        assert_eq!(rows.len(), 26);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.year, i as u32);
        }
    }

    #[test]
    fn test_row_zero_holds_the_purchase() {
        let rows = project_cash_flow(&cash_purchase());
        let r0 = &rows[0];
        assert_eq!(r0.generation_kwh, Decimal::ZERO);
        assert_eq!(r0.tariff_rate, dec!(1.10));
        assert_eq!(r0.net_savings, Decimal::ZERO);
        assert_eq!(r0.investment, dec!(-25_000));
        assert_eq!(r0.cumulative_cash_flow, dec!(-25_000));
    }

    #[test]
    fn test_first_year_uses_base_values() {
        let rows = project_cash_flow(&cash_purchase());
        let r1 = &rows[1];
        assert_eq!(r1.tariff_rate, dec!(1.10));
        assert_eq!(r1.generation_kwh, dec!(6000));
        assert_eq!(r1.gross_savings, dec!(6600));
        // 6000 * 1.10 * 0.28 * 0.15
        assert_eq!(r1.wire_fee_cost, dec!(277.20));
        assert_eq!(r1.net_savings, dec!(6322.80));
        assert_eq!(r1.investment, Decimal::ZERO);
        assert_eq!(r1.cumulative_cash_flow, dec!(-18677.20));
    }

    #[test]
    fn test_second_year_rounds_each_step() {
        let rows = project_cash_flow(&cash_purchase());
        let r2 = &rows[2];
        // 1.10 * 1.065 = 1.1715
        assert_eq!(r2.tariff_rate, dec!(1.17));
        // 6000 * 0.995 = 5970
        assert_eq!(r2.generation_kwh, dec!(5970));
        assert_eq!(r2.gross_savings, dec!(6984.90));
        // 5970 * 1.17 * 0.042 = 293.3658
        assert_eq!(r2.wire_fee_cost, dec!(293.37));
        assert_eq!(r2.net_savings, dec!(6691.53));
    }

    #[test]
    fn test_inverter_replacement_only_in_its_year() {
        let rows = project_cash_flow(&cash_purchase());
        for row in &rows[1..] {
            if row.year == 12 {
                assert_eq!(row.extra_cost, dec!(3750));
                assert_eq!(row.investment, dec!(-3750));
            } else {
                assert_eq!(row.extra_cost, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_replacement_year_zero_means_never() {
        let mut input = cash_purchase();
        input.assumptions.inverter_replacement_year = 0;
        let rows = project_cash_flow(&input);
        assert!(rows.iter().all(|r| r.extra_cost.is_zero()));
    }

    #[test]
    fn test_cumulative_accumulates_net_flow() {
        let rows = project_cash_flow(&cash_purchase());
        for pair in rows.windows(2) {
            assert_eq!(
                pair[1].cumulative_cash_flow,
                pair[0].cumulative_cash_flow + pair[1].net_flow()
            );
        }
    }

    #[test]
    fn test_generation_declines_and_tariff_rises() {
        let rows = project_cash_flow(&cash_purchase());
        for pair in rows[1..].windows(2) {
            assert!(pair[1].generation_kwh <= pair[0].generation_kwh);
            assert!(pair[1].tariff_rate >= pair[0].tariff_rate);
        }
    }

    #[test]
    fn test_financed_purchase_spreads_installments() {
        let mut input = cash_purchase();
        input.down_payment = dec!(5_000);
        input.installment_amount = dec!(700);
        input.num_installments = 30;
        let rows = project_cash_flow(&input);

        assert_eq!(rows[0].investment, dec!(-5_000));
        assert_eq!(rows[1].financing_cost, dec!(8_400));
        assert_eq!(rows[2].financing_cost, dec!(8_400));
        assert_eq!(rows[3].financing_cost, dec!(4_200));
        assert_eq!(rows[4].financing_cost, Decimal::ZERO);
        assert_eq!(rows[1].investment, dec!(-8_400));
    }

    #[test]
    fn test_installments_due_clamps() {
        assert_eq!(installments_due(0, 1), 0);
        assert_eq!(installments_due(5, 1), 5);
        assert_eq!(installments_due(36, 3), 12);
        assert_eq!(installments_due(36, 4), 0);
        assert_eq!(installments_due(400, 25), 12);
    }

    #[test]
    fn test_zero_generation_projection() {
        let mut input = cash_purchase();
        input.base_annual_generation_kwh = Decimal::ZERO;
        let rows = project_cash_flow(&input);
        assert!(rows[1..].iter().all(|r| r.net_savings.is_zero()));
        assert_eq!(rows[25].cumulative_cash_flow, dec!(-28_750));
    }

    #[test]
    fn test_runaway_inflation_saturates_instead_of_overflowing() {
        let mut input = cash_purchase();
        input.assumptions.tariff_inflation_percent = dec!(1500);
        let rows = project_cash_flow(&input);

        assert_eq!(rows.len(), 26);
        let last = &rows[25];
        assert_eq!(last.tariff_rate, round_money(Decimal::MAX));
        assert!(last.gross_savings >= last.net_savings);
        assert!(last.cumulative_cash_flow > Decimal::ZERO);
        for pair in rows.windows(2) {
            assert!(pair[1].cumulative_cash_flow >= pair[0].cumulative_cash_flow);
        }
    }
}
