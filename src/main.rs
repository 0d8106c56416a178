use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use simulator::config::{
    DEFAULT_INITIAL_CAPITAL, DEFAULT_MAX_CONCURRENT_POSITIONS, DEFAULT_POSITION_SIZE_VALUE,
};
use simulator::{data, runner, Engine, PositionSizingMethod, PriceTable, SimulationConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simulator")]
#[command(about = "Replays expert stock recommendations against a virtual portfolio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation over a candidate file and print or write the result
    Run {
        /// JSON candidate list, pre-filtered to one expert and sorted by date
        candidates: PathBuf,
        /// JSON price table used to value still-open positions
        #[arg(long, value_name = "PATH")]
        prices: Option<PathBuf>,
        /// Starting capital in currency units
        #[arg(long, default_value_t = DEFAULT_INITIAL_CAPITAL)]
        capital: f64,
        /// Simulation window start (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Simulation window end (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Position sizing method (FIXED_AMOUNT, EQUAL_WEIGHT, PERCENTAGE)
        #[arg(long, default_value = "FIXED_AMOUNT", value_parser = PositionSizingMethod::parse_arg)]
        sizing: PositionSizingMethod,
        /// Amount per trade (FIXED_AMOUNT) or percentage of capital (PERCENTAGE)
        #[arg(long, default_value_t = DEFAULT_POSITION_SIZE_VALUE)]
        size_value: f64,
        /// Maximum number of simultaneously open positions
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_POSITIONS)]
        max_positions: usize,
        /// Write the result JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run many independent simulations from a batch file on a worker pool
    Batch {
        /// JSON array of runs (expertId, candidatesFile, config fields)
        runs_file: PathBuf,
        /// Directory receiving one result file per expert
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            candidates,
            prices,
            capital,
            start,
            end,
            sizing,
            size_value,
            max_positions,
            output,
        } => {
            let config = SimulationConfig {
                initial_capital: capital,
                start_date: start,
                end_date: end,
                position_sizing_method: sizing,
                position_size_value: size_value,
                max_concurrent_positions: max_positions,
            };
            let candidates = data::load_candidates(&candidates)?;
            let prices = match prices {
                Some(path) => data::load_price_table(&path)?,
                None => PriceTable::new(),
            };
            let engine = Engine::new(config);
            let result = engine.run(&candidates, &prices)?;
            match output {
                Some(path) => data::write_result(&path, &result)?,
                None => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }
        Commands::Batch {
            runs_file,
            output_dir,
        } => {
            let runs = runner::load_runs(&runs_file)?;
            runner::run_batch(runs, &output_dir)?;
        }
    }

    Ok(())
}
