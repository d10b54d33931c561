//! Run command - supervise every download until it finishes or Ctrl+C.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use torkeep::registry::{DownloadId, Registry};
use torkeep::supervisor::SupervisorReport;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// How often changed status lines are printed.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Arguments for the run command.
pub struct RunArgs {
    pub sources: Vec<String>,
    pub save_path: Option<PathBuf>,
}

/// Run the run command.
pub fn run(runner: &CliRunner, args: RunArgs) -> Result<(), CliError> {
    runner.log_startup("run");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(serve(runner, args))
}

async fn serve(runner: &CliRunner, args: RunArgs) -> Result<(), CliError> {
    let registry = runner.open_registry()?;
    registry.sweep_interrupted_writes();

    println!("torkeep v{}", torkeep::VERSION);
    println!("============");
    println!();
    println!("Save path: {}", registry.default_save_path().display());
    println!("Sessions:  {}", registry.files().sessions_dir().display());
    println!();

    for (id, result) in registry.load_all() {
        if let Err(e) = result {
            eprintln!("Could not resume {}: {}", id, e);
        }
    }
    for source in &args.sources {
        match registry.add(source, args.save_path.as_deref()) {
            Ok(id) => println!("Added {}", id),
            Err(e) => eprintln!("Could not add {}: {}", source, e),
        }
    }

    if registry.active_count() == 0 {
        println!("No downloads to run.");
        return Ok(());
    }

    println!();
    println!("Press Ctrl+C to save progress and exit");
    println!();

    let interrupt = CancellationToken::new();
    let signalled = AtomicBool::new(false);
    {
        let interrupt = interrupt.clone();
        ctrlc::set_handler(move || {
            // Later interrupts are ignored while downloads drain.
            if !signalled.swap(true, Ordering::SeqCst) {
                println!();
                println!("Received interrupt, saving progress...");
                interrupt.cancel();
            }
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;
    }

    watch_downloads(&registry, &interrupt).await;

    let reports = registry.shutdown().await;
    print_summary(&reports);
    Ok(())
}

/// Print status changes until every supervisor has terminated.
async fn watch_downloads(registry: &Registry, interrupt: &CancellationToken) {
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    let mut last: HashMap<DownloadId, String> = HashMap::new();
    let mut stopping = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = interrupt.cancelled(), if !stopping => {
                stopping = true;
                let count = registry.interrupt();
                info!(count, "Stopping downloads");
            }
        }

        for entry in registry.list() {
            if last.get(&entry.id) != Some(&entry.status_line) {
                println!("[{}] {}", entry.name, entry.status_line);
                last.insert(entry.id, entry.status_line);
            }
        }

        if registry.active_count() == 0 {
            break;
        }
    }
}

fn print_summary(reports: &[SupervisorReport]) {
    println!();
    println!("Session Summary");
    println!("───────────────");
    for report in reports {
        let outcome = match &report.error {
            Some(e) => format!("error: {}", e),
            None if report.final_checkpoint_written => "progress saved".to_string(),
            None => "progress not saved".to_string(),
        };
        println!(
            "  {}: {} ({} checkpoints{})",
            report.name,
            outcome,
            report.checkpoints_written,
            if report.resumed { ", resumed" } else { "" }
        );
    }
}
