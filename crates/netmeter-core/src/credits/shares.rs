use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::allocation::ConsumptionUnit;
use crate::error::NetMeterError;
use crate::types::Percent;
use crate::NetMeterResult;

/// How the rateio screen fills in the share column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateioMode {
    /// Keep the shares typed by the user
    Manual,
    /// Same share for every eligible unit
    Equal,
    /// Shares weighted by each unit's monthly consumption
    ProportionalToConsumption,
}

/// Tolerance for the "shares add up to 100%" check.
const SHARE_SUM_TOLERANCE: Percent = dec!(0.01);

/// Suggest a share per unit for the given mode.
///
/// Automatic modes produce whole percentages summing to exactly 100 using
/// largest-remainder rounding (ties go to the earlier unit). The generator
/// gets 0 when it may not keep credits. If every eligible weight is zero the
/// split falls back to equal shares; with no eligible unit all shares are 0.
pub fn suggest_shares(
    units: &[ConsumptionUnit],
    mode: RateioMode,
    allow_generator_credit: bool,
) -> Vec<Percent> {
    if mode == RateioMode::Manual {
        return units.iter().map(|u| u.requested_share_percent).collect();
    }

    let eligible: Vec<bool> = units
        .iter()
        .map(|u| allow_generator_credit || !u.is_generator)
        .collect();

    let mut weights: Vec<Decimal> = units
        .iter()
        .zip(&eligible)
        .map(|(u, ok)| match (ok, mode) {
            (false, _) => Decimal::ZERO,
            (true, RateioMode::ProportionalToConsumption) => u.cap_kwh.max(Decimal::ZERO),
            (true, _) => Decimal::ONE,
        })
        .collect();

    if weights.iter().all(|w| w.is_zero()) {
        weights = eligible
            .iter()
            .map(|ok| if *ok { Decimal::ONE } else { Decimal::ZERO })
            .collect();
    }

    largest_remainder(&weights)
}

/// Split 100 into whole percentages proportional to `weights`.
fn largest_remainder(weights: &[Decimal]) -> Vec<Percent> {
    let total: Decimal = weights.iter().sum();
    if total.is_zero() {
        return vec![Decimal::ZERO; weights.len()];
    }

    let raw: Vec<Decimal> = weights
        .iter()
        .map(|w| w / total * Decimal::ONE_HUNDRED)
        .collect();
    let mut shares: Vec<Decimal> = raw.iter().map(|r| r.floor()).collect();

    let assigned: Decimal = shares.iter().sum();
    let mut leftover = (Decimal::ONE_HUNDRED - assigned).max(Decimal::ZERO);

    let mut order: Vec<usize> = (0..weights.len()).filter(|&i| !weights[i].is_zero()).collect();
    // Stable sort keeps index order among equal remainders
    order.sort_by(|&a, &b| (raw[b] - shares[b]).cmp(&(raw[a] - shares[a])));

    for i in order {
        if leftover <= Decimal::ZERO {
            break;
        }
        shares[i] += Decimal::ONE;
        leftover -= Decimal::ONE;
    }

    shares
}

/// Gate for saving a manual rateio: every share within 0-100 and the total
/// equal to 100 (within 0.01).
pub fn validate_shares(units: &[ConsumptionUnit]) -> NetMeterResult<()> {
    for (i, unit) in units.iter().enumerate() {
        let share = unit.requested_share_percent;
        if share < Decimal::ZERO || share > Decimal::ONE_HUNDRED {
            return Err(NetMeterError::InvalidInput {
                field: format!("units[{i}].requested_share_percent"),
                reason: format!("Share must be between 0 and 100, got {share}"),
            });
        }
    }

    let total: Percent = units.iter().map(|u| u.requested_share_percent).sum();
    if (total - Decimal::ONE_HUNDRED).abs() > SHARE_SUM_TOLERANCE {
        return Err(NetMeterError::UnbalancedShares {
            total: total.normalize().to_string(),
        });
    }

    Ok(())
}
