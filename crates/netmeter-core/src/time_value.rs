use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::NetMeterError;
use crate::types::{Money, Rate};
use crate::NetMeterResult;

/// Net Present Value of a series of cash flows. The first flow is at t = 0
/// and is not discounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> NetMeterResult<Money> {
    if rate <= dec!(-1) {
        return Err(NetMeterError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    Ok(discounted_sum(rate, cash_flows))
}

/// Iterative-discount-factor NPV. Callers guarantee `rate > -1`.
///
/// Saturates at the Decimal range instead of overflowing; once the discount
/// factor itself leaves the range the remaining terms are dropped.
fn discounted_sum(rate: Rate, cash_flows: &[Money]) -> Money {
    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match discount.checked_mul(one_plus_r) {
                Some(next) => discount = next,
                None => break,
            }
        }
        if discount.is_zero() {
            break;
        }
        let term = cf.checked_div(discount).unwrap_or(if cf.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        });
        result = result.saturating_add(term);
    }

    result
}

/// Search bracket and stopping rule for [`irr_bisection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BisectionConfig {
    pub lower: Rate,
    pub upper: Rate,
    pub max_iterations: u32,
    /// Stop as soon as |NPV(mid)| falls below this amount
    pub tolerance: Money,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            lower: dec!(-0.5),
            upper: dec!(5.0),
            max_iterations: 100,
            tolerance: dec!(0.01),
        }
    }
}

/// Outcome of a bisection IRR search. Always carries a best estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BisectionResult {
    pub rate: Rate,
    pub npv_at_rate: Money,
    pub iterations: u32,
    pub converged: bool,
}

/// Internal Rate of Return by bisection over a fixed bracket.
///
/// Assumes a conventional series (outflow first, inflows after) so NPV falls
/// as the rate rises: a positive NPV at the midpoint moves the lower bound up,
/// anything else moves the upper bound down. The loop runs at most
/// `max_iterations` times and never fails; if no midpoint satisfies the
/// tolerance the last midpoint is returned with `converged = false`.
pub fn irr_bisection(cash_flows: &[Money], config: &BisectionConfig) -> BisectionResult {
    let mut low = config.lower;
    let mut high = config.upper;
    let mut mid = (low + high) / dec!(2);
    let mut value = discounted_sum(mid, cash_flows);

    for i in 0..config.max_iterations {
        mid = (low + high) / dec!(2);
        value = discounted_sum(mid, cash_flows);

        if value.abs() < config.tolerance {
            log::debug!("IRR bisection converged after {} iterations at {mid}", i + 1);
            return BisectionResult {
                rate: mid,
                npv_at_rate: value,
                iterations: i + 1,
                converged: true,
            };
        }

        if value > Decimal::ZERO {
            low = mid;
        } else {
            high = mid;
        }
    }

    log::debug!(
        "IRR bisection exhausted {} iterations; best estimate {mid} (NPV {value})",
        config.max_iterations
    );
    BisectionResult {
        rate: mid,
        npv_at_rate: value,
        iterations: config.max_iterations,
        converged: false,
    }
}

/// Payment (PMT) in discount form: `-(pv + fv·v) · r / (1 - v)` with
/// `v = (1 + r)^-n`.
///
/// When `(1 + r)^n` exceeds the Decimal range, `v` is taken as 0 and the
/// payment collapses to the perpetuity `-pv · r`.
pub fn pmt(rate: Rate, nper: u32, present_value: Money, future_value: Money) -> NetMeterResult<Money> {
    if nper == 0 {
        return Err(NetMeterError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }
    if rate <= dec!(-1) {
        return Err(NetMeterError::InvalidInput {
            field: "rate".into(),
            reason: "Rate must be greater than -100%".into(),
        });
    }

    if rate.is_zero() {
        return Ok(-(present_value + future_value) / Decimal::from(nper));
    }

    let discount = match (Decimal::ONE + rate).checked_powi(i64::from(nper)) {
        Some(factor) => Decimal::ONE.checked_div(factor).unwrap_or(Decimal::ZERO),
        None if rate > Decimal::ZERO => Decimal::ZERO,
        None => {
            return Err(NetMeterError::InvalidInput {
                field: "nper".into(),
                reason: "Discount factor out of range for a negative rate".into(),
            })
        }
    };

    let annuity_denominator = Decimal::ONE - discount;
    if annuity_denominator.is_zero() {
        return Err(NetMeterError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    let numerator = (present_value + future_value.saturating_mul(discount)).saturating_mul(rate);
    numerator
        .checked_div(annuity_denominator)
        .map(|p| -p)
        .ok_or_else(|| NetMeterError::InvalidInput {
            field: "present_value".into(),
            reason: "Payment out of range".into(),
        })
}
