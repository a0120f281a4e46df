pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "credits")]
pub mod credits;

#[cfg(feature = "financing")]
pub mod financing;

#[cfg(feature = "projection")]
pub mod projection;

pub use error::NetMeterError;
pub use types::*;

/// Standard result type for all net-metering operations
pub type NetMeterResult<T> = Result<T, NetMeterError>;
