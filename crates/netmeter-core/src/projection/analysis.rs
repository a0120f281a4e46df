use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::assumptions::EconomicAssumptions;
use super::cash_flow::{project_cash_flow, CashFlowInput, CashFlowRow, PROJECTION_YEARS};
use super::generation::{estimate_generation, GenerationInput};
use super::returns::{compute_return_metrics, ReturnMetrics};
use crate::error::NetMeterError;
use crate::financing::amortization::FinancingOption;
use crate::financing::quotes::validate_option;
use crate::types::{round_money, with_metadata, ComputationOutput, Kwh, Money};
use crate::NetMeterResult;

/// Highest yearly tariff increase accepted for a proposal.
pub const MAX_TARIFF_INFLATION_PERCENT: Decimal = Decimal::ONE_HUNDRED;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A priced proposal as it leaves the wizard's pricing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentInput {
    /// Turnkey price of the system
    pub investment_price: Money,
    /// First-year generation (kWh/year). Takes precedence over `system`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_annual_generation_kwh: Option<Kwh>,
    /// Modules and site data used to estimate generation when no figure is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<GenerationInput>,
    /// Current tariff (R$/kWh)
    pub base_tariff_rate: Money,
    #[serde(default)]
    pub assumptions: EconomicAssumptions,
    /// Paid upfront when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingOption>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Sums over projection years 1..=25.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionTotals {
    pub generation_kwh: Kwh,
    pub gross_savings: Money,
    pub wire_fee_cost: Money,
    pub net_savings: Money,
    pub extra_cost: Money,
    pub financing_cost: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentAnalysis {
    pub base_annual_generation_kwh: Kwh,
    /// Monthly installment rounded to cents, 0 when paid upfront. The
    /// projection charges exactly this amount per month.
    pub installment_amount: Money,
    pub num_installments: u32,
    pub metrics: ReturnMetrics,
    pub totals: ProjectionTotals,
    pub cash_flow: Vec<CashFlowRow>,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Run the whole return analysis for a proposal: installment, 25-year
/// projection and payback / IRR / NPV.
pub fn analyze_investment(
    input: &InvestmentInput,
) -> NetMeterResult<ComputationOutput<InvestmentAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let base_annual_generation_kwh = match (&input.base_annual_generation_kwh, &input.system) {
        (Some(kwh), _) => *kwh,
        (None, Some(system)) => estimate_generation(system)?.annual_kwh,
        (None, None) => {
            return Err(NetMeterError::InsufficientData(
                "Either base_annual_generation_kwh or system is required".into(),
            ))
        }
    };

    let (installment_amount, num_installments, down_payment) = match &input.financing {
        Some(option) => {
            let installment = round_money(option.installment());
            if installment.is_zero() {
                (Decimal::ZERO, 0, Decimal::ZERO)
            } else {
                (installment, option.term_months, option.down_payment)
            }
        }
        None => (Decimal::ZERO, 0, Decimal::ZERO),
    };

    if let Some(option) = &input.financing {
        if option.down_payment > input.investment_price {
            warnings.push(format!(
                "Down payment ({}) exceeds the investment price ({})",
                option.down_payment, input.investment_price
            ));
        }
        if option.principal != input.investment_price {
            warnings.push(format!(
                "Financed principal ({}) differs from the investment price ({})",
                option.principal, input.investment_price
            ));
        }
    }

    let cash_flow = project_cash_flow(&CashFlowInput {
        investment_price: input.investment_price,
        assumptions: input.assumptions.clone(),
        installment_amount,
        num_installments,
        down_payment,
        base_annual_generation_kwh,
        base_tariff_rate: input.base_tariff_rate,
    });

    let metrics = compute_return_metrics(
        &cash_flow,
        input.investment_price,
        input.assumptions.discount_rate_percent,
    );

    if !metrics.paid_back {
        warnings.push(format!(
            "Investment not recovered within {PROJECTION_YEARS} years; payback reported as {PROJECTION_YEARS}"
        ));
    }
    if metrics.irr_percent.is_zero() {
        warnings.push("IRR is negative or zero; reported as 0%".into());
    } else if !metrics.irr_converged {
        warnings.push(format!(
            "IRR bisection did not reach its tolerance; {}% is the best estimate",
            metrics.irr_percent.round_dp(4)
        ));
    }
    if metrics.npv < Decimal::ZERO {
        warnings.push(format!(
            "NPV of {} at {}% is negative",
            metrics.npv, input.assumptions.discount_rate_percent
        ));
    }
    if num_installments > PROJECTION_YEARS * 12 {
        warnings.push(format!(
            "Financing term of {num_installments} months runs past the projection horizon"
        ));
    }

    let totals = sum_projection_years(&cash_flow);
    let analysis = InvestmentAnalysis {
        base_annual_generation_kwh,
        installment_amount,
        num_installments,
        metrics,
        totals,
        cash_flow,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "25-year net-metering savings projection with bisection IRR",
        &serde_json::json!({
            "investment_price": input.investment_price.to_string(),
            "base_tariff_rate": input.base_tariff_rate.to_string(),
            "base_annual_generation_kwh": base_annual_generation_kwh.to_string(),
            "financed": num_installments > 0,
            "economic_assumptions": input.assumptions,
        }),
        warnings,
        elapsed,
        analysis,
    ))
}

fn sum_projection_years(rows: &[CashFlowRow]) -> ProjectionTotals {
    let sum = |field: fn(&CashFlowRow) -> Money| {
        rows.iter()
            .filter(|r| r.year > 0)
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(field(r)))
    };
    ProjectionTotals {
        generation_kwh: sum(|r| r.generation_kwh),
        gross_savings: sum(|r| r.gross_savings),
        wire_fee_cost: sum(|r| r.wire_fee_cost),
        net_savings: sum(|r| r.net_savings),
        extra_cost: sum(|r| r.extra_cost),
        financing_cost: sum(|r| r.financing_cost),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &InvestmentInput) -> NetMeterResult<()> {
    if input.investment_price <= Decimal::ZERO {
        return Err(NetMeterError::InvalidInput {
            field: "investment_price".into(),
            reason: "Investment price must be positive".into(),
        });
    }

    if input.base_tariff_rate < Decimal::ZERO {
        return Err(NetMeterError::InvalidInput {
            field: "base_tariff_rate".into(),
            reason: "Tariff cannot be negative".into(),
        });
    }

    if let Some(kwh) = input.base_annual_generation_kwh {
        if kwh < Decimal::ZERO {
            return Err(NetMeterError::InvalidInput {
                field: "base_annual_generation_kwh".into(),
                reason: "Generation cannot be negative".into(),
            });
        }
    }

    let a = &input.assumptions;
    if a.tariff_inflation_percent <= -Decimal::ONE_HUNDRED
        || a.tariff_inflation_percent > MAX_TARIFF_INFLATION_PERCENT
    {
        return Err(NetMeterError::InvalidInput {
            field: "tariff_inflation_percent".into(),
            reason: format!(
                "Must be greater than -100 and at most {MAX_TARIFF_INFLATION_PERCENT}"
            ),
        });
    }
    if a.efficiency_loss_percent_per_year < Decimal::ZERO
        || a.efficiency_loss_percent_per_year > Decimal::ONE_HUNDRED
    {
        return Err(NetMeterError::InvalidInput {
            field: "efficiency_loss_percent_per_year".into(),
            reason: "Must be between 0 and 100".into(),
        });
    }
    if a.discount_rate_percent <= -Decimal::ONE_HUNDRED {
        return Err(NetMeterError::InvalidInput {
            field: "discount_rate_percent".into(),
            reason: "Must be greater than -100".into(),
        });
    }
    if a.inverter_replacement_year > PROJECTION_YEARS {
        return Err(NetMeterError::InvalidInput {
            field: "inverter_replacement_year".into(),
            reason: format!("Must be between 0 (never) and {PROJECTION_YEARS}"),
        });
    }
    if a.inverter_replacement_cost_percent < Decimal::ZERO {
        return Err(NetMeterError::InvalidInput {
            field: "inverter_replacement_cost_percent".into(),
            reason: "Cannot be negative".into(),
        });
    }

    if let Some(option) = &input.financing {
        validate_option(option)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
