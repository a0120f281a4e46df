//! 25-year savings projection for a solar proposal and the return metrics
//! (payback, IRR, NPV) derived from it.

pub mod analysis;
pub mod assumptions;
pub mod cash_flow;
pub mod generation;
pub mod returns;
