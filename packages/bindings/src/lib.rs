use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Serialize;

use netmeter_core::credits::allocation::{self, AllocationInput};
use netmeter_core::financing::amortization::{self, AmortizationRow, FinancingOption};
use netmeter_core::financing::quotes;
use netmeter_core::projection::analysis::{self, InvestmentInput};
use netmeter_core::projection::cash_flow::{self, CashFlowInput};
use netmeter_core::projection::generation::{self, GenerationInput};
use netmeter_core::projection::returns::ReturnsInput;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InstallmentOutput {
    installment: Decimal,
    financed_amount: Decimal,
    schedule: Vec<AmortizationRow>,
}

/// Installment for one financing option, with its amortization table.
#[napi]
pub fn compute_installment(input_json: String) -> NapiResult<String> {
    let option: FinancingOption = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    quotes::validate_option(&option).map_err(to_napi_error)?;
    let output = InstallmentOutput {
        installment: netmeter_core::round_money(option.installment()),
        financed_amount: option.financed_amount(),
        schedule: amortization::amortization_schedule(&option),
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Takes a JSON array of financing options.
#[napi]
pub fn quote_financing_options(input_json: String) -> NapiResult<String> {
    let options: Vec<FinancingOption> =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = quotes::quote_financing_options(&options).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Credits
// ---------------------------------------------------------------------------

#[napi]
pub fn allocate_credits(input_json: String) -> NapiResult<String> {
    let input: AllocationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = allocation::analyze_allocation(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[napi]
pub fn project_cash_flow(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rows = cash_flow::project_cash_flow(&input);
    serde_json::to_string(&rows).map_err(to_napi_error)
}

#[napi]
pub fn compute_return_metrics(input_json: String) -> NapiResult<String> {
    let input: ReturnsInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    if input.cash_flow.is_empty() {
        return Err(to_napi_error("cash_flow must contain at least the year-0 row"));
    }
    serde_json::to_string(&input.metrics()).map_err(to_napi_error)
}

#[napi]
pub fn analyze_investment(input_json: String) -> NapiResult<String> {
    let input: InvestmentInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = analysis::analyze_investment(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn estimate_generation(input_json: String) -> NapiResult<String> {
    let input: GenerationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = generation::estimate_generation(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
