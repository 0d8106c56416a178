use crate::config::SimulationConfig;
use crate::data::{load_candidates, load_price_table, write_result};
use crate::engine::Engine;
use crate::models::SimulationResult;
use crate::valuation::PriceTable;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::ProgressBar;
use log::{info, warn};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::thread;

/// One entry in a batch file: an expert, its candidate file, and the
/// simulation parameters for the run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    pub expert_id: String,
    pub candidates_file: PathBuf,
    #[serde(default)]
    pub prices_file: Option<PathBuf>,
    #[serde(flatten)]
    pub config: SimulationConfig,
}

struct BatchTask {
    run: BatchRun,
}

struct BatchResultMsg {
    expert_id: String,
    outcome: StdResult<SimulationResult, String>,
}

pub fn load_runs(path: &Path) -> Result<Vec<BatchRun>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open batch file {}", path.display()))?;
    let runs: Vec<BatchRun> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse batch file {}", path.display()))?;
    Ok(runs)
}

/// Execute many independent simulations on a worker-thread pool. Runs share
/// no mutable state, so the only coordination is the task and result
/// channels; each run itself stays strictly sequential.
pub fn run_batch(runs: Vec<BatchRun>, output_dir: &Path) -> Result<()> {
    if runs.is_empty() {
        info!("Batch file contains no runs; nothing to do.");
        return Ok(());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let total = runs.len();
    let num_workers = std::cmp::min(total, std::cmp::max(1, num_cpus::get()));
    info!(
        "Running {} simulation{} on {} worker thread{}",
        total,
        if total == 1 { "" } else { "s" },
        num_workers,
        if num_workers == 1 { "" } else { "s" }
    );

    let (task_tx, task_rx): (Sender<BatchTask>, Receiver<BatchTask>) = bounded(total);
    let (result_tx, result_rx): (Sender<BatchResultMsg>, Receiver<BatchResultMsg>) =
        bounded(total);

    let mut handles = Vec::new();
    for _ in 0..num_workers {
        let rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let handle = thread::spawn(move || {
            while let Ok(task) = rx.recv() {
                let expert_id = task.run.expert_id.clone();
                let outcome = execute_run(&task.run).map_err(|error| error.to_string());
                if result_tx.send(BatchResultMsg { expert_id, outcome }).is_err() {
                    break;
                }
            }
        });
        handles.push(handle);
    }

    for run in runs {
        task_tx.send(BatchTask { run })?;
    }
    drop(task_tx);
    drop(result_tx);

    let progress = ProgressBar::new(total as u64);
    let mut failures: Vec<String> = Vec::new();
    while let Ok(message) = result_rx.recv() {
        progress.inc(1);
        match message.outcome {
            Ok(result) => {
                let path = output_dir.join(format!("{}.json", message.expert_id));
                if let Err(error) = write_result(&path, &result) {
                    warn!(
                        "Failed to write result for expert {}: {}",
                        message.expert_id, error
                    );
                    failures.push(format!("{} ({})", message.expert_id, error));
                } else {
                    info!(
                        "Expert {}: {} trades, final value {:.2}",
                        message.expert_id, result.total_trades, result.final_value
                    );
                }
            }
            Err(error) => {
                warn!(
                    "Simulation failed for expert {}: {}",
                    message.expert_id, error
                );
                failures.push(format!("{} ({})", message.expert_id, error));
            }
        }
    }
    progress.finish_and_clear();

    for handle in handles {
        let _ = handle.join();
    }

    if failures.is_empty() {
        info!("Batch completed successfully");
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} simulation{} failed: {}",
            failures.len(),
            total,
            if total == 1 { "" } else { "s" },
            failures.join(", ")
        ))
    }
}

fn execute_run(run: &BatchRun) -> Result<SimulationResult> {
    let candidates = load_candidates(&run.candidates_file)?;
    let prices = match &run.prices_file {
        Some(path) => load_price_table(path)?,
        None => PriceTable::new(),
    };
    let engine = Engine::new(run.config.clone());
    Ok(engine.run(&candidates, &prices)?)
}
