use clap::{Args, ValueEnum};
use serde_json::Value;

use netmeter_core::credits::allocation::{self, AllocationInput};
use netmeter_core::credits::shares::{self, RateioMode};

use crate::input;

/// How shares are filled in before allocating
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShareMode {
    /// Use the shares in the input document
    Manual,
    /// Same share for every eligible unit
    Equal,
    /// Shares proportional to each unit's consumption cap
    Proportional,
}

impl From<ShareMode> for RateioMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Manual => RateioMode::Manual,
            ShareMode::Equal => RateioMode::Equal,
            ShareMode::Proportional => RateioMode::ProportionalToConsumption,
        }
    }
}

/// Arguments for the monthly credit allocation (rateio)
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Replace the requested shares with suggested ones
    #[arg(long, value_enum, default_value = "manual")]
    pub shares: ShareMode,

    /// Refuse to allocate when the shares do not sum to 100%
    #[arg(long)]
    pub strict: bool,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alloc_input: AllocationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for credit allocation".into());
    };

    let mode = RateioMode::from(args.shares);
    if mode != RateioMode::Manual {
        let suggested =
            shares::suggest_shares(&alloc_input.units, mode, alloc_input.allow_generator_credit);
        for (unit, share) in alloc_input.units.iter_mut().zip(suggested) {
            unit.requested_share_percent = share;
        }
    }

    if args.strict {
        shares::validate_shares(&alloc_input.units)?;
    }

    let result = allocation::analyze_allocation(&alloc_input)?;
    Ok(serde_json::to_value(result)?)
}
