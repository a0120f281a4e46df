use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use netmeter_core::projection::analysis::{self, InvestmentInput};
use netmeter_core::projection::cash_flow::{self, CashFlowInput};
use netmeter_core::projection::generation::{self, GenerationInput, ModuleRating};
use netmeter_core::projection::returns::ReturnsInput;

use crate::input;

/// Arguments for the 25-year cash-flow projection
#[derive(Args)]
pub struct CashFlowArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_cash_flow(args: CashFlowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cf_input: CashFlowInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for cash-flow projection".into());
    };
    let rows = cash_flow::project_cash_flow(&cf_input);
    Ok(json!({ "result": { "cash_flow": rows } }))
}

/// Arguments for payback / IRR / NPV of a projected table
#[derive(Args)]
pub struct ReturnsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Discount rate for the NPV in percent (overrides the document)
    #[arg(long)]
    pub discount_rate: Option<Decimal>,
}

pub fn run_returns(args: ReturnsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut returns_input: ReturnsInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for return metrics".into());
    };
    if let Some(rate) = args.discount_rate {
        returns_input.discount_rate_percent = rate;
    }
    if returns_input.cash_flow.is_empty() {
        return Err("cash_flow must contain at least the year-0 row".into());
    }

    Ok(json!({ "result": returns_input.metrics() }))
}

/// Arguments for the full proposal analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let inv_input: InvestmentInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for investment analysis".into());
    };
    let result = analysis::analyze_investment(&inv_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the generation estimate
#[derive(Args)]
pub struct GenerationArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Module rating in watts-peak
    #[arg(long)]
    pub module_wp: Option<Decimal>,

    /// Number of modules
    #[arg(long)]
    pub modules: Option<u32>,

    /// Peak sun hours per day at the site
    #[arg(long)]
    pub peak_sun_hours: Option<Decimal>,

    /// Performance ratio (0.80 when omitted)
    #[arg(long)]
    pub performance_ratio: Option<Decimal>,

    /// Monthly consumption to cover (kWh); adds the required system power
    #[arg(long)]
    pub consumption_kwh: Option<Decimal>,
}

pub fn run_generation(args: GenerationArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let gen_input: GenerationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let power_wp = args
            .module_wp
            .ok_or("--module-wp is required (or provide --input)")?;
        let quantity = args
            .modules
            .ok_or("--modules is required (or provide --input)")?;
        let peak_sun_hours = args
            .peak_sun_hours
            .ok_or("--peak-sun-hours is required (or provide --input)")?;

        GenerationInput {
            modules: vec![ModuleRating {
                model: None,
                power_wp,
                quantity,
            }],
            peak_sun_hours,
            performance_ratio: args
                .performance_ratio
                .unwrap_or_else(generation::default_performance_ratio),
        }
    };

    let estimate = generation::estimate_generation(&gen_input)?;
    let mut result = serde_json::to_value(&estimate)?;
    if let Some(consumption) = args.consumption_kwh {
        let required = generation::required_system_power(
            consumption,
            gen_input.peak_sun_hours,
            gen_input.performance_ratio,
        )?;
        result["required_system_power_kwp"] = serde_json::to_value(required)?;
    }
    Ok(json!({ "result": result }))
}
