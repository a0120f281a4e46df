//! Consumer financing for solar kits: constant-installment (Price system)
//! amortization and side-by-side quotes for the financing-options screen.

pub mod amortization;
pub mod quotes;
