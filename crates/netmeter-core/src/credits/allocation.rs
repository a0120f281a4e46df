use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::Instant;

use crate::error::NetMeterError;
use crate::types::{with_metadata, ComputationOutput, Kwh, Percent};
use crate::NetMeterResult;

/// Upper bound on redistribution rounds. Every round either locks at least
/// one more unit or empties the pool, so this is a termination guard only.
pub const MAX_ALLOCATION_ROUNDS: u32 = 10;

/// Pool below which redistribution stops (kWh).
const POOL_EPSILON: Kwh = dec!(0.01);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// An electricity account (UC) that can receive credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionUnit {
    /// Account number or nickname shown in the rateio table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Monthly consumption ceiling (kWh/month); the unit never receives more
    pub cap_kwh: Kwh,
    /// Whether the array is physically connected at this unit
    #[serde(default)]
    pub is_generator: bool,
    /// Requested share of the generation, 0-100
    pub requested_share_percent: Percent,
}

/// Input document for [`analyze_allocation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    /// Generation available for allocation (kWh/month)
    pub generation_total: Kwh,
    pub units: Vec<ConsumptionUnit>,
    /// When false the generator unit keeps no credits for itself
    #[serde(default = "default_allow_generator_credit")]
    pub allow_generator_credit: bool,
}

fn default_allow_generator_credit() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Credits assigned to one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitAllocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub allocated_kwh: Kwh,
    /// Share of the generation actually received, rounded to a whole percent
    pub effective_percent: u32,
}

/// Result of a credit allocation, one entry per input unit in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub units: Vec<UnitAllocation>,
    /// Generation no unit had room for
    pub unallocated_kwh: Kwh,
    /// Redistribution rounds executed
    pub iterations: u32,
}

impl AllocationResult {
    pub fn total_allocated(&self) -> Kwh {
        self.units.iter().map(|u| u.allocated_kwh).sum()
    }
}

/// Snapshot between redistribution rounds.
#[derive(Debug, Clone)]
struct AllocationState {
    allocated: Vec<Kwh>,
    locked: Vec<bool>,
    pool: Kwh,
    rounds: u32,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Distribute `generation_total` across `units` in proportion to their shares
/// without exceeding any unit's cap.
///
/// Capped units are locked and their excess is carried into the next round,
/// where it is split among the units that still have room. When
/// `allow_generator_credit` is false the generator's share is zeroed and the
/// remaining shares are rescaled to 100. Shares that do not sum to 100 are
/// allocated as given.
pub fn allocate_credits(
    generation_total: Kwh,
    units: &[ConsumptionUnit],
    allow_generator_credit: bool,
) -> AllocationResult {
    let total = generation_total.max(Decimal::ZERO);
    let caps: Vec<Kwh> = units.iter().map(|u| u.cap_kwh.max(Decimal::ZERO)).collect();
    let shares = effective_shares(units, allow_generator_credit);

    let total_capacity: Kwh = caps.iter().sum();
    if total > Decimal::ZERO && total_capacity.is_zero() {
        log::warn!("No consumption capacity for {total} kWh; everything stays unallocated");
    }

    let initial = AllocationState {
        allocated: vec![Decimal::ZERO; units.len()],
        locked: vec![false; units.len()],
        pool: total,
        rounds: 0,
    };

    let outcome = (0..MAX_ALLOCATION_ROUNDS).try_fold(initial, |state, _| {
        if state.pool <= POOL_EPSILON {
            return ControlFlow::Break(state);
        }
        match redistribute(&state, &shares, &caps) {
            Some(next) => ControlFlow::Continue(next),
            None => ControlFlow::Break(state),
        }
    });
    let state = match outcome {
        ControlFlow::Break(s) | ControlFlow::Continue(s) => s,
    };

    let allocated_sum: Kwh = state.allocated.iter().sum();
    let unallocated_kwh = (total - allocated_sum).max(Decimal::ZERO);

    let allocations = units
        .iter()
        .zip(&state.allocated)
        .map(|(unit, &allocated_kwh)| UnitAllocation {
            label: unit.label.clone(),
            allocated_kwh,
            effective_percent: percent_of(allocated_kwh, total),
        })
        .collect();

    AllocationResult {
        units: allocations,
        unallocated_kwh,
        iterations: state.rounds,
    }
}

/// Shares used by the allocation loop. Negative requests count as zero.
fn effective_shares(units: &[ConsumptionUnit], allow_generator_credit: bool) -> Vec<Percent> {
    let requested: Vec<Percent> = units
        .iter()
        .map(|u| u.requested_share_percent.max(Decimal::ZERO))
        .collect();

    let generator = match units.iter().position(|u| u.is_generator) {
        Some(idx) if !allow_generator_credit => idx,
        _ => return requested,
    };

    let others_sum: Percent = requested
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != generator)
        .map(|(_, s)| *s)
        .sum();

    requested
        .iter()
        .enumerate()
        .map(|(i, &share)| {
            if i == generator {
                Decimal::ZERO
            } else if others_sum > Decimal::ZERO {
                share / others_sum * Decimal::ONE_HUNDRED
            } else {
                share
            }
        })
        .collect()
}

/// One redistribution round. Returns `None` when no unlocked unit has a
/// positive share, i.e. the pool cannot go anywhere.
fn redistribute(
    state: &AllocationState,
    shares: &[Percent],
    caps: &[Kwh],
) -> Option<AllocationState> {
    let active_sum: Percent = shares
        .iter()
        .zip(&state.locked)
        .filter(|(_, locked)| !**locked)
        .map(|(s, _)| *s)
        .sum();
    if active_sum <= Decimal::ZERO {
        return None;
    }

    let mut next = state.clone();
    let mut carried = Decimal::ZERO;

    for i in 0..shares.len() {
        if state.locked[i] {
            continue;
        }
        let tentative = shares[i] / active_sum * state.pool;
        let room = (caps[i] - state.allocated[i]).max(Decimal::ZERO);

        if tentative <= room {
            next.allocated[i] += tentative;
        } else {
            next.allocated[i] += room;
            next.locked[i] = true;
            carried += tentative - room;
        }
    }

    next.pool = carried;
    next.rounds += 1;
    log::debug!(
        "allocation round {}: {} unit(s) locked, carrying {} kWh",
        next.rounds,
        next.locked.iter().filter(|l| **l).count(),
        carried
    );
    Some(next)
}

fn percent_of(allocated: Kwh, total: Kwh) -> u32 {
    if total <= Decimal::ZERO {
        return 0;
    }
    (allocated / total * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
        .min(100)
}

// ---------------------------------------------------------------------------
// Validated entry point
// ---------------------------------------------------------------------------

/// Validate an allocation document, run [`allocate_credits`] and wrap the
/// result with warnings for the rateio screen.
pub fn analyze_allocation(
    input: &AllocationInput,
) -> NetMeterResult<ComputationOutput<AllocationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let share_sum: Percent = input.units.iter().map(|u| u.requested_share_percent).sum();
    if (share_sum - Decimal::ONE_HUNDRED).abs() > dec!(0.01) {
        warnings.push(format!(
            "Requested shares sum to {share_sum}%, not 100%; the rateio cannot be saved as is"
        ));
    }

    let has_generator = input.units.iter().any(|u| u.is_generator);
    if has_generator && !input.allow_generator_credit {
        warnings.push(
            "Generator unit excluded from credits; remaining shares rescaled to 100%".into(),
        );
    }

    let result = allocate_credits(input.generation_total, &input.units, input.allow_generator_credit);

    if result.unallocated_kwh > Decimal::ZERO {
        warnings.push(format!(
            "{} kWh/month exceed the combined consumption caps and stay unallocated",
            result.unallocated_kwh
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Iterative proportional credit allocation with per-unit caps",
        &serde_json::json!({
            "generation_total": input.generation_total.to_string(),
            "units": input.units.len(),
            "allow_generator_credit": input.allow_generator_credit,
            "max_rounds": MAX_ALLOCATION_ROUNDS,
        }),
        warnings,
        elapsed,
        result,
    ))
}

fn validate_input(input: &AllocationInput) -> NetMeterResult<()> {
    if input.generation_total < Decimal::ZERO {
        return Err(NetMeterError::InvalidInput {
            field: "generation_total".into(),
            reason: "Generation cannot be negative".into(),
        });
    }

    if input.units.is_empty() {
        return Err(NetMeterError::InsufficientData(
            "At least one consumption unit is required".into(),
        ));
    }

    for (i, unit) in input.units.iter().enumerate() {
        if unit.cap_kwh < Decimal::ZERO {
            return Err(NetMeterError::InvalidInput {
                field: format!("units[{i}].cap_kwh"),
                reason: "Consumption cap cannot be negative".into(),
            });
        }
        if unit.requested_share_percent < Decimal::ZERO
            || unit.requested_share_percent > Decimal::ONE_HUNDRED
        {
            return Err(NetMeterError::InvalidInput {
                field: format!("units[{i}].requested_share_percent"),
                reason: "Share must be between 0 and 100".into(),
            });
        }
    }

    if input.units.iter().filter(|u| u.is_generator).count() > 1 {
        return Err(NetMeterError::InvalidInput {
            field: "units".into(),
            reason: "Only one unit can be the generator".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn unit(cap: Decimal, share: Decimal, is_generator: bool) -> ConsumptionUnit {
        ConsumptionUnit {
            label: None,
            cap_kwh: cap,
            is_generator,
            requested_share_percent: share,
        }
    }

    fn assert_conserved(result: &AllocationResult, total: Decimal) {
        let diff = (result.total_allocated() + result.unallocated_kwh - total).abs();
        assert!(diff < dec!(0.000001), "conservation off by {diff}");
    }

    fn assert_caps_respected(result: &AllocationResult, units: &[ConsumptionUnit]) {
        for (i, (alloc, unit)) in result.units.iter().zip(units).enumerate() {
            assert!(
                alloc.allocated_kwh <= unit.cap_kwh + dec!(0.000001),
                "unit {i}: {} exceeds cap {}",
                alloc.allocated_kwh,
                unit.cap_kwh
            );
            assert!(alloc.allocated_kwh >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_generator_excluded_and_capped() {
        let units = vec![
            unit(dec!(400), dec!(60), true),
            unit(dec!(800), dec!(40), false),
        ];
        let result = allocate_credits(dec!(1000), &units, false);

        assert_eq!(result.units[0].allocated_kwh, Decimal::ZERO);
        assert_eq!(result.units[1].allocated_kwh, dec!(800));
        assert_eq!(result.unallocated_kwh, dec!(200));
        assert_eq!(result.units[1].effective_percent, 80);
        assert_conserved(&result, dec!(1000));
    }

    #[test]
    fn test_proportional_when_caps_not_binding() {
        let units = vec![
            unit(dec!(1000), dec!(50), true),
            unit(dec!(1000), dec!(30), false),
            unit(dec!(1000), dec!(20), false),
        ];
        let result = allocate_credits(dec!(900), &units, true);

        assert_eq!(result.units[0].allocated_kwh, dec!(450));
        assert_eq!(result.units[1].allocated_kwh, dec!(270));
        assert_eq!(result.units[2].allocated_kwh, dec!(180));
        assert_eq!(result.unallocated_kwh, Decimal::ZERO);
        assert_eq!(result.iterations, 1);
        let percents: Vec<u32> = result.units.iter().map(|u| u.effective_percent).collect();
        assert_eq!(percents, vec![50, 30, 20]);
    }

    #[test]
    fn test_surplus_redistributed_to_units_with_room() {
        // Unit 0 wants 50% of 1000 but can only take 100; the other 400 go to
        // the remaining units in their 30:20 ratio.
        let units = vec![
            unit(dec!(100), dec!(50), false),
            unit(dec!(2000), dec!(30), false),
            unit(dec!(2000), dec!(20), false),
        ];
        let result = allocate_credits(dec!(1000), &units, true);

        assert_eq!(result.units[0].allocated_kwh, dec!(100));
        assert!((result.units[1].allocated_kwh - dec!(540)).abs() < dec!(0.000001));
        assert!((result.units[2].allocated_kwh - dec!(360)).abs() < dec!(0.000001));
        assert!(result.unallocated_kwh < dec!(0.000001));
        assert_eq!(result.iterations, 2);
        assert_caps_respected(&result, &units);
        assert_conserved(&result, dec!(1000));
    }

    #[test]
    fn test_cascading_caps() {
        let units = vec![
            unit(dec!(100), dec!(40), false),
            unit(dec!(250), dec!(30), false),
            unit(dec!(300), dec!(20), false),
            unit(dec!(5000), dec!(10), false),
        ];
        let result = allocate_credits(dec!(2000), &units, true);

        assert_eq!(result.units[0].allocated_kwh, dec!(100));
        assert_eq!(result.units[1].allocated_kwh, dec!(250));
        assert_eq!(result.units[2].allocated_kwh, dec!(300));
        assert!((result.units[3].allocated_kwh - dec!(1350)).abs() < dec!(0.02));
        assert!(result.iterations <= units.len() as u32);
        assert_caps_respected(&result, &units);
        assert_conserved(&result, dec!(2000));
    }

    #[test]
    fn test_zero_generation() {
        let units = vec![unit(dec!(300), dec!(100), false)];
        let result = allocate_credits(Decimal::ZERO, &units, true);
        assert_eq!(result.units[0].allocated_kwh, Decimal::ZERO);
        assert_eq!(result.units[0].effective_percent, 0);
        assert_eq!(result.unallocated_kwh, Decimal::ZERO);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_zero_capacity_leaves_everything_unallocated() {
        let units = vec![
            unit(Decimal::ZERO, dec!(50), false),
            unit(Decimal::ZERO, dec!(50), false),
        ];
        let result = allocate_credits(dec!(750), &units, true);
        assert_eq!(result.total_allocated(), Decimal::ZERO);
        assert_eq!(result.unallocated_kwh, dec!(750));
    }

    #[test]
    fn test_generator_only_with_exclusion() {
        // Other shares sum to zero: no renormalisation, nothing allocated
        let units = vec![
            unit(dec!(500), dec!(100), true),
            unit(dec!(500), Decimal::ZERO, false),
        ];
        let result = allocate_credits(dec!(400), &units, false);
        assert_eq!(result.total_allocated(), Decimal::ZERO);
        assert_eq!(result.unallocated_kwh, dec!(400));
    }

    #[test]
    fn test_generator_exclusion_renormalises() {
        let units = vec![
            unit(dec!(10_000), dec!(50), true),
            unit(dec!(10_000), dec!(30), false),
            unit(dec!(10_000), dec!(20), false),
        ];
        let result = allocate_credits(dec!(1000), &units, false);
        assert_eq!(result.units[0].allocated_kwh, Decimal::ZERO);
        assert_eq!(result.units[1].allocated_kwh, dec!(600));
        assert_eq!(result.units[2].allocated_kwh, dec!(400));
    }

    #[test]
    fn test_shares_not_summing_to_100_still_allocate() {
        let units = vec![
            unit(dec!(10_000), dec!(30), false),
            unit(dec!(10_000), dec!(10), false),
        ];
        let result = allocate_credits(dec!(800), &units, true);
        assert_eq!(result.units[0].allocated_kwh, dec!(600));
        assert_eq!(result.units[1].allocated_kwh, dec!(200));
    }

    #[test]
    fn test_invariants_over_many_configurations() {
        let caps = [dec!(0), dec!(50), dec!(120), dec!(333.33), dec!(900)];
        let shares = [dec!(0), dec!(10), dec!(25), dec!(40), dec!(65)];
        let totals = [dec!(0), dec!(1), dec!(100), dec!(777.7), dec!(5000)];

        for (k, total) in totals.iter().enumerate() {
            for allow in [true, false] {
                let units: Vec<ConsumptionUnit> = (0..caps.len())
                    .map(|i| {
                        unit(
                            caps[(i + k) % caps.len()],
                            shares[(i * 3 + k) % shares.len()],
                            i == k % caps.len(),
                        )
                    })
                    .collect();
                let result = allocate_credits(*total, &units, allow);

                assert_conserved(&result, *total);
                assert_caps_respected(&result, &units);
                assert!(result.iterations <= MAX_ALLOCATION_ROUNDS);
                if !allow {
                    let gen = units.iter().position(|u| u.is_generator).unwrap();
                    assert_eq!(result.units[gen].allocated_kwh, Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_round_limit_leaves_pool_unallocated() {
        // Weights halve from unit to unit and each cap sits just above what
        // the unit already holds, so exactly one unit locks per round.
        let caps = [
            dec!(50_012),
            dec!(272_578),
            dec!(247_755),
            dec!(174_091),
            dec!(109_690),
            dec!(65_079),
            dec!(37_184),
            dec!(20_718),
            dec!(11_350),
            dec!(6_154),
            dec!(1_000_000),
            dec!(1_000_000),
        ];
        let units: Vec<ConsumptionUnit> = caps
            .iter()
            .enumerate()
            .map(|(i, cap)| unit(*cap, Decimal::from(1u32 << (11 - i)), false))
            .collect();
        let total = dec!(1_000_000);
        let result = allocate_credits(total, &units, true);

        assert_eq!(result.iterations, MAX_ALLOCATION_ROUNDS);
        for (alloc, cap) in result.units.iter().zip(&caps).take(10) {
            assert!((alloc.allocated_kwh - cap).abs() < dec!(0.000001));
        }
        // The last two units still have room; the round limit, not the
        // caps, stops the loop with about 442 kWh still in the pool.
        assert!(result.units[10].allocated_kwh < dec!(1_000_000));
        assert!(result.units[11].allocated_kwh < dec!(1_000_000));
        assert!((result.unallocated_kwh - dec!(442)).abs() < dec!(0.001));
        assert_conserved(&result, total);
        assert_caps_respected(&result, &units);
    }

    #[test]
    fn test_pool_at_epsilon_stops_redistribution() {
        // Unit 0 overflows by 0.005 kWh, under the 0.01 kWh threshold, so
        // unit 1 is not topped up even though it has room.
        let units = vec![
            unit(dec!(49.995), dec!(50), false),
            unit(dec!(1000), dec!(50), false),
        ];
        let result = allocate_credits(dec!(100), &units, true);

        assert_eq!(result.iterations, 1);
        assert_eq!(result.units[0].allocated_kwh, dec!(49.995));
        assert_eq!(result.units[1].allocated_kwh, dec!(50));
        assert_eq!(result.unallocated_kwh, dec!(0.005));
        assert_conserved(&result, dec!(100));
    }

    #[test]
    fn test_analyze_allocation_warnings() {
        let input = AllocationInput {
            generation_total: dec!(1000),
            units: vec![
                unit(dec!(400), dec!(60), true),
                unit(dec!(800), dec!(40), false),
            ],
            allow_generator_credit: false,
        };
        let output = analyze_allocation(&input).unwrap();
        assert_eq!(output.result.unallocated_kwh, dec!(200));
        assert!(output.warnings.iter().any(|w| w.contains("Generator unit excluded")));
        assert!(output.warnings.iter().any(|w| w.contains("unallocated")));
    }

    #[test]
    fn test_analyze_allocation_flags_unbalanced_shares() {
        let input = AllocationInput {
            generation_total: dec!(100),
            units: vec![unit(dec!(400), dec!(70), false), unit(dec!(400), dec!(20), false)],
            allow_generator_credit: true,
        };
        let output = analyze_allocation(&input).unwrap();
        assert!(output.warnings.iter().any(|w| w.contains("not 100%")));
    }

    #[test]
    fn test_analyze_allocation_rejects_two_generators() {
        let input = AllocationInput {
            generation_total: dec!(100),
            units: vec![unit(dec!(400), dec!(50), true), unit(dec!(400), dec!(50), true)],
            allow_generator_credit: true,
        };
        assert!(analyze_allocation(&input).is_err());
    }

    #[test]
    fn test_analyze_allocation_rejects_negative_cap() {
        let input = AllocationInput {
            generation_total: dec!(100),
            units: vec![unit(dec!(-1), dec!(100), false)],
            allow_generator_credit: true,
        };
        match analyze_allocation(&input).unwrap_err() {
            NetMeterError::InvalidInput { field, .. } => assert_eq!(field, "units[0].cap_kwh"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
