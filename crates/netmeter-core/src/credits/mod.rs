//! Rateio de créditos: distribution of net-metering credits from the
//! generator unit across the consumption units (UCs) of one customer.

pub mod allocation;
pub mod shares;
