mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::credits::AllocateArgs;
use commands::financing::{FinancingQuotesArgs, InstallmentArgs};
use commands::projection::{AnalyzeArgs, CashFlowArgs, GenerationArgs, ReturnsArgs};

/// Net-metering credit allocation and solar investment returns
#[derive(Parser)]
#[command(
    name = "netmeter",
    version,
    about = "Net-metering credit allocation and solar investment returns",
    long_about = "A CLI for distributed-generation solar proposals with decimal precision. \
                  Splits monthly credits across consumption units, prices financing plans \
                  and projects 25 years of savings with payback, IRR and NPV."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Monthly installment (Price system) and optional amortization table
    Installment(InstallmentArgs),
    /// Compare several financing plans side by side
    FinancingQuotes(FinancingQuotesArgs),
    /// Allocate a month's credits across consumption units
    Allocate(AllocateArgs),
    /// Project 25 years of savings, costs and cumulative cash flow
    CashFlow(CashFlowArgs),
    /// Payback, IRR and NPV of a projected cash-flow table
    Returns(ReturnsArgs),
    /// Full proposal analysis: installment, projection and return metrics
    Analyze(AnalyzeArgs),
    /// Estimate monthly and annual generation of a module set
    Generation(GenerationArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Installment(args) => commands::financing::run_installment(args),
        Commands::FinancingQuotes(args) => commands::financing::run_financing_quotes(args),
        Commands::Allocate(args) => commands::credits::run_allocate(args),
        Commands::CashFlow(args) => commands::projection::run_cash_flow(args),
        Commands::Returns(args) => commands::projection::run_returns(args),
        Commands::Analyze(args) => commands::projection::run_analyze(args),
        Commands::Generation(args) => commands::projection::run_generation(args),
        Commands::Version => {
            println!("netmeter {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            log::debug!("command failed: {e:?}");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
