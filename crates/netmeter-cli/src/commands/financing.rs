use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use netmeter_core::financing::amortization::{self, FinancingOption};
use netmeter_core::financing::quotes;
use netmeter_core::round_money;

use crate::input;

/// Arguments for the monthly installment calculation
#[derive(Args)]
pub struct InstallmentArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount financed before the down payment (usually the kit price)
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Down payment paid upfront
    #[arg(long)]
    pub down_payment: Option<Decimal>,

    /// Monthly interest rate in percent (1.5 = 1.5% a.m.)
    #[arg(long)]
    pub rate_percent: Option<Decimal>,

    /// Number of monthly installments
    #[arg(long)]
    pub term_months: Option<u32>,

    /// Months before the first installment
    #[arg(long)]
    pub grace_months: Option<u32>,

    /// Include the month-by-month amortization table
    #[arg(long)]
    pub schedule: bool,
}

pub fn run_installment(args: InstallmentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let option: FinancingOption = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let principal = args
            .principal
            .ok_or("--principal is required (or provide --input)")?;
        let monthly_rate_percent = args
            .rate_percent
            .ok_or("--rate-percent is required (or provide --input)")?;
        let term_months = args
            .term_months
            .ok_or("--term-months is required (or provide --input)")?;

        FinancingOption {
            label: None,
            principal,
            down_payment: args.down_payment.unwrap_or_default(),
            monthly_rate_percent,
            term_months,
            grace_months: args.grace_months.unwrap_or_default(),
        }
    };

    let installment = amortization::compute_installment(
        option.principal,
        option.down_payment,
        option.monthly_rate_percent,
        option.term_months,
    );

    let mut result = json!({
        "installment": round_money(installment),
        "financed_amount": option.financed_amount(),
        "term_months": option.term_months,
        "monthly_rate_percent": option.monthly_rate_percent,
    });
    if args.schedule {
        quotes::validate_option(&option)?;
        result["schedule"] = serde_json::to_value(amortization::amortization_schedule(&option))?;
    }

    Ok(json!({ "result": result }))
}

/// Arguments for comparing several financing plans
#[derive(Args)]
pub struct FinancingQuotesArgs {
    /// Path to JSON input file: an array of options or `{ "options": [...] }`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuotesDocument {
    List(Vec<FinancingOption>),
    Wrapped { options: Vec<FinancingOption> },
}

pub fn run_financing_quotes(
    args: FinancingQuotesArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let doc: QuotesDocument = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for financing quotes".into());
    };
    let options = match doc {
        QuotesDocument::List(options) | QuotesDocument::Wrapped { options } => options,
    };

    let result = quotes::quote_financing_options(&options)?;
    Ok(json!({ "result": result }))
}
