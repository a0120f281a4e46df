use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amortization::{
    amortization_schedule, FinancingOption, MAX_GRACE_MONTHS, MAX_TERM_MONTHS,
};
use crate::error::NetMeterError;
use crate::types::{round_money, Money};
use crate::NetMeterResult;

/// Summary of one financing option, as listed on the financing-options screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingQuote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub financed_amount: Money,
    pub installment: Money,
    pub term_months: u32,
    /// Month of the first installment (after any grace period); 0 if nothing is financed
    pub first_payment_month: u32,
    pub last_payment_month: u32,
    /// Down payment plus every installment
    pub total_paid: Money,
    pub total_interest: Money,
}

/// Quote every financing option. Rejects negative amounts and zero terms.
pub fn quote_financing_options(options: &[FinancingOption]) -> NetMeterResult<Vec<FinancingQuote>> {
    options.iter().map(quote_option).collect()
}

fn quote_option(option: &FinancingOption) -> NetMeterResult<FinancingQuote> {
    validate_option(option)?;

    let schedule = amortization_schedule(option);
    let total_installments: Money = schedule.iter().map(|r| r.payment).sum();
    let total_interest: Money = schedule.iter().map(|r| r.interest).sum();
    let first_payment_month = schedule
        .iter()
        .find(|r| r.payment > Decimal::ZERO)
        .map(|r| r.month)
        .unwrap_or(0);
    let last_payment_month = schedule.last().map(|r| r.month).unwrap_or(0);

    Ok(FinancingQuote {
        label: option.label.clone(),
        financed_amount: option.financed_amount(),
        installment: round_money(option.installment()),
        term_months: option.term_months,
        first_payment_month,
        last_payment_month,
        total_paid: option.down_payment + total_installments,
        total_interest,
    })
}

/// Boundary checks for a financing option entered by the user.
pub fn validate_option(option: &FinancingOption) -> NetMeterResult<()> {
    let checks = [
        ("principal", option.principal),
        ("down_payment", option.down_payment),
        ("monthly_rate_percent", option.monthly_rate_percent),
    ];
    for (field, value) in checks {
        if value < Decimal::ZERO {
            return Err(NetMeterError::InvalidInput {
                field: field.into(),
                reason: format!("must be non-negative, got {value}"),
            });
        }
    }

    if option.term_months == 0 || option.term_months > MAX_TERM_MONTHS {
        return Err(NetMeterError::InvalidInput {
            field: "term_months".into(),
            reason: format!("Term must be between 1 and {MAX_TERM_MONTHS} months"),
        });
    }

    if option.grace_months > MAX_GRACE_MONTHS {
        return Err(NetMeterError::InvalidInput {
            field: "grace_months".into(),
            reason: format!("Grace period cannot exceed {MAX_GRACE_MONTHS} months"),
        });
    }

    Ok(())
}
