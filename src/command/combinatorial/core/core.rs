use log::{debug, error, info};
use std::path::Path;
use std::sync::Arc;

use crossbeam::channel;

use super::collector::spawn_collector;
use super::dispatch::spawn_dispatcher;
use super::params;
use super::worker::{spawn_workers, WorkerReport};
use crate::barcode::{BarcodeMatcher, CacheSnapshot, ReferenceSet, Side, TieBreaker};
use crate::command::combinatorial::stats::{report_stats, save_stats};
use crate::common::{Chunk, Tally};
use crate::fileformat::output::{Output, OutputConfig};
use crate::threading::{join_draining, log_error_reports, put_or_abort, AbortFlag};

///////////////////////////////
/// Outcome of one pipeline run
#[derive(Debug)]
pub struct RunSummary {
    pub tally: Tally,
    pub bc1: CacheSnapshot,
    pub bc2: CacheSnapshot,
    pub n_written: u64,
    /// Some component failed; output holds only the in-order prefix that made it through
    pub aborted: bool,
}

fn load_tiebreaker(
    path_ref: &Path,
    path_cache: Option<&Path>,
    side: Side,
) -> anyhow::Result<TieBreaker> {
    let refs = ReferenceSet::from_fasta(path_ref, side)?;
    let mut tiebreaker = TieBreaker::new(BarcodeMatcher::new(refs));
    if let Some(path) = path_cache {
        tiebreaker.load_cache(path);
    }
    Ok(tiebreaker)
}

fn store_snapshot(snapshot: &CacheSnapshot, path: Option<&Path>, min_count: f64) -> anyhow::Result<()> {
    let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    let n = snapshot.store_cache(path, min_count)?;
    info!("stored {} cache entries in {}", n, path.display());
    Ok(())
}

///////////////////////////////
/// Run the dispatcher, worker pool and collector to completion and merge what the
/// workers published. Component failures do not make this fail; they raise the abort
/// flag and show up as `aborted` in the summary
pub fn run(
    io: params::IO,
    runtime: params::Runtime,
    threading: params::Threading,
    output_config: OutputConfig,
) -> anyhow::Result<RunSummary> {
    let bc1 = load_tiebreaker(&io.path_bc1_ref, io.path_bc1_cache.as_deref(), Side::Left)?;
    let bc2 = load_tiebreaker(&io.path_bc2_ref, io.path_bc2_cache.as_deref(), Side::Right)?;
    debug!(
        "loaded {} BC1 and {} BC2 references",
        bc1.matcher().references().n_references(),
        bc2.matcher().references().n_references()
    );
    let output = Output::new(output_config)?;

    let io = Arc::new(io);
    let runtime = Arc::new(runtime);
    let threading = Arc::new(threading);

    let (chunk_tx, chunk_rx) = channel::bounded::<Option<Chunk>>(threading.queue_capacity);
    let (result_tx, result_rx) = channel::unbounded();
    let (err_tx, err_rx) = channel::unbounded();
    let abort = AbortFlag::new();

    let dispatcher = spawn_dispatcher(
        Arc::clone(&io),
        Arc::clone(&runtime),
        Arc::clone(&threading),
        chunk_tx.clone(),
        &abort,
        &err_tx,
    )?;
    info!("Started dispatch");
    let workers = spawn_workers(
        &bc1,
        &bc2,
        Arc::clone(&runtime),
        Arc::clone(&threading),
        &chunk_rx,
        &result_tx,
        &abort,
        &err_tx,
    )?;
    info!("Started workers");
    let collector = spawn_collector(
        output,
        result_rx.clone(),
        threading.queue_timeout,
        threading.report_interval,
        &abort,
        &err_tx,
    )?;
    info!("Started collector");

    let (_, drained, errors) = join_draining(dispatcher, &chunk_rx, &err_rx, &abort);
    info!("The dispatcher exited");
    if !drained.is_empty() || !errors.is_empty() {
        info!("{} chunks were drained from the chunk queue upon abort.", drained.len());
        log_error_reports(errors);
    }

    info!("Signalling all workers to finish");
    for _ in 0..workers.len() {
        // each worker consumes exactly one end marker
        if !put_or_abort(&chunk_tx, None, &abort, threading.queue_timeout) {
            break;
        }
    }

    let mut merged = WorkerReport::default();
    for handle in workers {
        let (report, drained, errors) = join_draining(handle, &result_rx, &err_rx, &abort);
        if !drained.is_empty() || !errors.is_empty() {
            info!("{} chunks were drained from the result queue upon abort.", drained.len());
            log_error_reports(errors);
        }
        if let Some(report) = report {
            merged.merge(report);
        }
    }

    info!("All workers have joined. Signalling collector to finish.");
    // the collector may already be gone after an abort
    let _ = result_tx.send(None);
    let collected = match collector.join() {
        Ok(report) => report,
        Err(_) => {
            error!("collector panicked outside of its guard");
            abort.raise();
            None
        }
    };
    let collected = collected.unwrap_or_default();
    info!("Collector has joined. Merging worker statistics.");
    log_error_reports(err_rx.try_iter());

    let WorkerReport {
        mut tally,
        bc1: snapshot1,
        bc2: snapshot2,
    } = merged;
    // make the summary explicit even when nothing came through
    tally.add("total", 0.0);
    let total = tally.get("total");
    if total > 0.0 {
        info!(
            "Run completed. Overall combinatorial barcode assignment rate was {}",
            100.0 * tally.get("called") / total
        );
    } else {
        error!("No reads were processed!");
    }
    report_stats(&tally, "");

    if io.update_cache {
        store_snapshot(&snapshot1, io.path_bc1_cache.as_deref(), runtime.min_cache_count)?;
        store_snapshot(&snapshot2, io.path_bc2_cache.as_deref(), runtime.min_cache_count)?;
    }
    if let Some(path) = &io.path_stats {
        save_stats(
            path,
            &tally,
            Some((&snapshot1.name_count, &snapshot2.name_count)),
        )?;
    }

    Ok(RunSummary {
        tally,
        bc1: snapshot1,
        bc2: snapshot2,
        n_written: collected.n_records,
        aborted: abort.is_raised(),
    })
}
