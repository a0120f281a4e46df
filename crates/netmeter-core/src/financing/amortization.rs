use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time_value;
use crate::types::{percent_to_rate, round_money, Money, Percent};

/// Longest financing term accepted at the boundary (50 years).
pub const MAX_TERM_MONTHS: u32 = 600;

/// Longest grace period accepted at the boundary.
pub const MAX_GRACE_MONTHS: u32 = 36;

/// A financing plan as entered on the financing-options screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingOption {
    /// Lender / plan name shown to the customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Amount being financed before the down payment (usually the kit price)
    pub principal: Money,
    #[serde(default)]
    pub down_payment: Money,
    /// Monthly interest rate in percent (1.5 = 1.5% a.m.)
    pub monthly_rate_percent: Percent,
    pub term_months: u32,
    /// Months before the first installment is due
    #[serde(default)]
    pub grace_months: u32,
}

impl FinancingOption {
    /// Principal net of the down payment, floored at zero.
    pub fn financed_amount(&self) -> Money {
        (self.principal - self.down_payment).max(Decimal::ZERO)
    }

    /// Constant monthly installment for this plan.
    pub fn installment(&self) -> Money {
        compute_installment(
            self.principal,
            self.down_payment,
            self.monthly_rate_percent,
            self.term_months,
        )
    }
}

/// One month of a Price-system amortization table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    /// Month counted from contract signature (1-based, grace months included)
    pub month: u32,
    pub payment: Money,
    pub interest: Money,
    pub amortization: Money,
    /// Outstanding balance after this month's payment
    pub balance: Money,
}

/// Constant installment that amortizes `max(0, principal - down_payment)`
/// over `term_months` at `rate_percent` per month.
///
/// Returns zero when there is nothing to finance or the term is zero, and a
/// plain `base / term` split when the rate is zero. Negative rates are
/// treated as zero; callers are expected to clamp other negative inputs.
/// Never panics: terms long enough to push `(1 + r)^n` past the Decimal
/// range settle at the interest-only payment `base × r`.
pub fn compute_installment(
    principal: Money,
    down_payment: Money,
    rate_percent: Percent,
    term_months: u32,
) -> Money {
    let base = principal - down_payment;
    if base <= Decimal::ZERO || term_months == 0 {
        return Decimal::ZERO;
    }

    let rate = percent_to_rate(rate_percent.max(Decimal::ZERO));
    // A rate too small to move the discount factor behaves like zero
    time_value::pmt(rate, term_months, -base, Decimal::ZERO)
        .unwrap_or_else(|_| base / Decimal::from(term_months))
}

/// Month-by-month Price table for a financing option.
///
/// Callers are expected to have checked the option with
/// [`validate_option`](super::quotes::validate_option); month numbers
/// saturate rather than wrap on unchecked input.
///
/// Grace months carry no payment and no capitalized interest; the installment
/// is the one from [`compute_installment`]. Interest is rounded to cents each
/// month and the final payment absorbs the rounding residue so the balance
/// closes at exactly zero.
pub fn amortization_schedule(option: &FinancingOption) -> Vec<AmortizationRow> {
    let financed = option.financed_amount();
    if financed.is_zero() || option.term_months == 0 {
        return Vec::new();
    }

    let rate = percent_to_rate(option.monthly_rate_percent.max(Decimal::ZERO));
    let installment = round_money(option.installment());
    let total_months = option.grace_months.saturating_add(option.term_months);

    let mut rows = Vec::with_capacity(total_months.min(MAX_TERM_MONTHS + MAX_GRACE_MONTHS) as usize);
    let mut balance = financed;

    for month in 1..=option.grace_months {
        rows.push(AmortizationRow {
            month,
            payment: Decimal::ZERO,
            interest: Decimal::ZERO,
            amortization: Decimal::ZERO,
            balance,
        });
    }

    for k in 1..=option.term_months {
        let month = option.grace_months.saturating_add(k);
        let interest = round_money(balance * rate);
        let (payment, amortization) = if k == option.term_months {
            (balance + interest, balance)
        } else {
            let amortization = (installment - interest).min(balance);
            (interest + amortization, amortization)
        };
        balance -= amortization;

        rows.push(AmortizationRow {
            month,
            payment,
            interest,
            amortization,
            balance,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::MathematicalOps;
    use rust_decimal_macros::dec;

    fn kit_loan() -> FinancingOption {
        FinancingOption {
            label: Some("Banco Solar 36x".into()),
            principal: dec!(30_000),
            down_payment: Decimal::ZERO,
            monthly_rate_percent: dec!(1.5),
            term_months: 36,
            grace_months: 0,
        }
    }

    #[test]
    fn test_installment_matches_price_formula() {
        let r = dec!(0.015);
        let factor = (Decimal::ONE + r).powi(36);
        let expected = dec!(30_000) * (r * factor) / (factor - Decimal::ONE);

        let result = compute_installment(dec!(30_000), Decimal::ZERO, dec!(1.5), 36);
        assert!(
            (result - expected).abs() < dec!(0.000001),
            "installment {result} != formula {expected}"
        );
        // Roughly R$ 1,084 per month
        assert!(result > dec!(1_000) && result < dec!(1_100));
    }

    #[test]
    fn test_installment_zero_rate_is_simple_division() {
        let result = compute_installment(dec!(12_000), Decimal::ZERO, Decimal::ZERO, 24);
        assert_eq!(result, dec!(500));
    }

    #[test]
    fn test_installment_zero_principal() {
        assert_eq!(
            compute_installment(Decimal::ZERO, Decimal::ZERO, dec!(1.5), 36),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_installment_down_payment_covers_price() {
        assert_eq!(
            compute_installment(dec!(20_000), dec!(25_000), dec!(1.2), 48),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_installment_zero_term() {
        assert_eq!(
            compute_installment(dec!(20_000), Decimal::ZERO, dec!(1.2), 0),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_installment_negative_rate_treated_as_zero() {
        let result = compute_installment(dec!(1_200), Decimal::ZERO, dec!(-2), 12);
        assert_eq!(result, dec!(100));
    }

    #[test]
    fn test_down_payment_reduces_installment() {
        let full = compute_installment(dec!(30_000), Decimal::ZERO, dec!(1.5), 36);
        let partial = compute_installment(dec!(30_000), dec!(10_000), dec!(1.5), 36);
        let expected = compute_installment(dec!(20_000), Decimal::ZERO, dec!(1.5), 36);
        assert!(partial < full);
        assert_eq!(partial, expected);
    }

    #[test]
    fn test_schedule_closes_at_zero() {
        let option = kit_loan();
        let rows = amortization_schedule(&option);
        assert_eq!(rows.len(), 36);

        let last = rows.last().unwrap();
        assert_eq!(last.balance, Decimal::ZERO);

        let total_amortized: Money = rows.iter().map(|r| r.amortization).sum();
        assert_eq!(total_amortized, dec!(30_000));

        // Installments are level except for the rounding-absorbing last one
        let installment = round_money(option.installment());
        for row in &rows[..35] {
            assert_eq!(row.payment, installment);
        }
        assert!((last.payment - installment).abs() < dec!(1));
    }

    #[test]
    fn test_schedule_interest_declines() {
        let rows = amortization_schedule(&kit_loan());
        for pair in rows.windows(2) {
            assert!(pair[1].interest <= pair[0].interest);
        }
        assert_eq!(rows[0].interest, dec!(450));
    }

    #[test]
    fn test_schedule_with_grace_period() {
        let mut option = kit_loan();
        option.grace_months = 3;
        let rows = amortization_schedule(&option);

        assert_eq!(rows.len(), 39);
        for row in &rows[..3] {
            assert_eq!(row.payment, Decimal::ZERO);
            assert_eq!(row.balance, dec!(30_000));
        }
        assert_eq!(rows[3].month, 4);
        assert_eq!(rows[3].payment, round_money(option.installment()));
    }

    #[test]
    fn test_schedule_empty_when_nothing_financed() {
        let mut option = kit_loan();
        option.down_payment = dec!(30_000);
        assert!(amortization_schedule(&option).is_empty());
    }

    #[test]
    fn test_installment_very_long_term_is_interest_only() {
        let result = compute_installment(dec!(30_000), Decimal::ZERO, dec!(1.5), 5000);
        assert_eq!(result, dec!(450));
    }

    #[test]
    fn test_installment_high_rate_long_term_is_interest_only() {
        // 1.30^360 overflows the Decimal range
        let result = compute_installment(dec!(30_000), Decimal::ZERO, dec!(30), 360);
        assert_eq!(result, dec!(9000));
    }
}
