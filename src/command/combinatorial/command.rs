use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use super::constants::{
    COMBINATORIAL_DEFAULT_CHUNK_SIZE, COMBINATORIAL_DEFAULT_MIN_CACHE_COUNT,
    COMBINATORIAL_DEFAULT_MIN_OPSEQ_SCORE, COMBINATORIAL_DEFAULT_OPSEQ,
    COMBINATORIAL_DEFAULT_PARALLEL, COMBINATORIAL_DEFAULT_THRESHOLD,
    COMBINATORIAL_QUEUE_SLOTS_PER_WORKER, COMBINATORIAL_QUEUE_TIMEOUT_MS,
    COMBINATORIAL_REPORT_INTERVAL_SECS,
};
use super::core::{params, run};
use crate::command::options::CommonArgs;

#[derive(Args)]
pub struct Command {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long, default_value_t = COMBINATORIAL_DEFAULT_PARALLEL, help = "Number of worker threads")]
    parallel: usize,
    #[arg(long = "chunk-size", default_value_t = COMBINATORIAL_DEFAULT_CHUNK_SIZE, help = "Reads per unit of work")]
    chunk_size: usize,
    #[arg(long, default_value = COMBINATORIAL_DEFAULT_OPSEQ, help = "Primer separating BC1 and BC2 in read 1")]
    opseq: String,
    #[arg(long = "min-opseq-score", default_value_t = COMBINATORIAL_DEFAULT_MIN_OPSEQ_SCORE)]
    min_opseq_score: f64,
    #[arg(long, default_value_t = COMBINATORIAL_DEFAULT_THRESHOLD, help = "Fraction of the perfect score a barcode call needs")]
    threshold: f64,

    #[arg(long = "bc1-ref", help = "FASTA of BC1 reference barcodes")]
    path_bc1_ref: PathBuf,
    #[arg(long = "bc2-ref", help = "FASTA of BC2 reference barcodes")]
    path_bc2_ref: PathBuf,
    #[arg(long = "bc1-cache", help = "TSV cache of BC1 resolutions")]
    path_bc1_cache: Option<PathBuf>,
    #[arg(long = "bc2-cache", help = "TSV cache of BC2 resolutions")]
    path_bc2_cache: Option<PathBuf>,
    #[arg(long = "update-cache", help = "Write the caches back after the run")]
    update_cache: bool,
    #[arg(long = "min-cache-count", default_value_t = COMBINATORIAL_DEFAULT_MIN_CACHE_COUNT, help = "Only cache queries seen at least this often")]
    min_cache_count: f64,
}

impl Command {
    pub fn try_execute(&mut self) -> anyhow::Result<()> {
        self.common.init_logging()?;
        self.validate()?;
        let output_config = self.common.output_config(true)?;

        let params_io = params::IO {
            path_r1: self.common.path_r1.clone(),
            path_r2: self.common.path_r2.clone(),
            path_bc1_ref: self.path_bc1_ref.clone(),
            path_bc2_ref: self.path_bc2_ref.clone(),
            path_bc1_cache: self.path_bc1_cache.clone(),
            path_bc2_cache: self.path_bc2_cache.clone(),
            update_cache: self.update_cache,
            path_stats: self.common.path_stats().map(PathBuf::from),
        };
        let params_runtime = params::Runtime {
            opseq: self.opseq.as_bytes().to_vec(),
            min_opseq_score: self.min_opseq_score,
            threshold: self.threshold,
            chunk_size: self.chunk_size,
            min_cache_count: self.min_cache_count,
            na: self.common.na.clone(),
        };
        let params_threading = params::Threading {
            threads_work: self.parallel,
            queue_capacity: self.parallel * COMBINATORIAL_QUEUE_SLOTS_PER_WORKER,
            queue_timeout: Duration::from_millis(COMBINATORIAL_QUEUE_TIMEOUT_MS),
            report_interval: Duration::from_secs(COMBINATORIAL_REPORT_INTERVAL_SECS),
        };
        info!(
            "Using {} worker threads, {} reads per chunk",
            params_threading.threads_work, params_runtime.chunk_size
        );

        let summary = run(params_io, params_runtime, params_threading, output_config)?;
        if summary.aborted {
            anyhow::bail!(
                "run aborted after a component failure; {} reads were written before the abort",
                summary.n_written
            );
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.parallel == 0 {
            anyhow::bail!("At least one worker thread required");
        }
        if self.chunk_size == 0 {
            anyhow::bail!("--chunk-size must be positive");
        }
        if self.opseq.is_empty() {
            anyhow::bail!("--opseq must not be empty");
        }
        if self.update_cache && self.path_bc1_cache.is_none() && self.path_bc2_cache.is_none() {
            warn!("--update-cache given without --bc1-cache or --bc2-cache; nothing will be stored");
        }
        Ok(())
    }
}
