pub mod credits;
pub mod financing;
pub mod projection;
