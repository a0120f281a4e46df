use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::NetMeterError;
use crate::types::{round_money, Kwh};
use crate::NetMeterResult;

const DAYS_PER_MONTH: Decimal = dec!(30);
const MONTHS_PER_YEAR: Decimal = dec!(12);
const WATTS_PER_KILOWATT: Decimal = dec!(1000);

/// A module line from the equipment catalog: only the power rating matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRating {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Nameplate power per module (Wp)
    pub power_wp: Decimal,
    pub quantity: u32,
}

/// Site and system data for a generation estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationInput {
    pub modules: Vec<ModuleRating>,
    /// Average daily peak sun hours at the site (kWh/m²/day)
    pub peak_sun_hours: Decimal,
    /// System losses folded into one factor (0.80 = 20% losses)
    #[serde(default = "default_performance_ratio")]
    pub performance_ratio: Decimal,
}

pub fn default_performance_ratio() -> Decimal {
    dec!(0.80)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEstimate {
    pub system_power_kwp: Decimal,
    pub monthly_kwh: Kwh,
    pub annual_kwh: Kwh,
}

impl GenerationInput {
    pub fn system_power_kwp(&self) -> Decimal {
        self.modules
            .iter()
            .map(|m| m.power_wp * Decimal::from(m.quantity))
            .sum::<Decimal>()
            / WATTS_PER_KILOWATT
    }
}

/// First-year generation: `kWp × sun hours × 30 × performance ratio` per month.
pub fn estimate_generation(input: &GenerationInput) -> NetMeterResult<GenerationEstimate> {
    validate_input(input)?;

    let system_power_kwp = input.system_power_kwp();
    let monthly =
        system_power_kwp * input.peak_sun_hours * DAYS_PER_MONTH * input.performance_ratio;

    Ok(GenerationEstimate {
        system_power_kwp,
        monthly_kwh: round_money(monthly),
        annual_kwh: round_money(monthly * MONTHS_PER_YEAR),
    })
}

/// System power needed to cover `monthly_consumption_kwh`; the sizing step
/// that precedes picking modules from the catalog.
pub fn required_system_power(
    monthly_consumption_kwh: Kwh,
    peak_sun_hours: Decimal,
    performance_ratio: Decimal,
) -> NetMeterResult<Decimal> {
    let yield_per_kwp = peak_sun_hours * DAYS_PER_MONTH * performance_ratio;
    if yield_per_kwp <= Decimal::ZERO {
        return Err(NetMeterError::DivisionByZero {
            context: "monthly yield per kWp".into(),
        });
    }
    Ok((monthly_consumption_kwh.max(Decimal::ZERO) / yield_per_kwp).round_dp(2))
}

fn validate_input(input: &GenerationInput) -> NetMeterResult<()> {
    if input.peak_sun_hours < Decimal::ZERO || input.peak_sun_hours > dec!(24) {
        return Err(NetMeterError::InvalidInput {
            field: "peak_sun_hours".into(),
            reason: "Must be between 0 and 24".into(),
        });
    }
    if input.performance_ratio <= Decimal::ZERO || input.performance_ratio > Decimal::ONE {
        return Err(NetMeterError::InvalidInput {
            field: "performance_ratio".into(),
            reason: "Must be in (0, 1]".into(),
        });
    }
    if let Some(m) = input.modules.iter().find(|m| m.power_wp < Decimal::ZERO) {
        return Err(NetMeterError::InvalidInput {
            field: "modules.power_wp".into(),
            reason: format!("Negative module power {}", m.power_wp),
        });
    }
    Ok(())
}
