use std::path::PathBuf;
use std::time::Duration;

pub struct IO {
    pub path_r1: PathBuf,
    pub path_r2: Option<PathBuf>,

    pub path_bc1_ref: PathBuf,
    pub path_bc2_ref: PathBuf,
    pub path_bc1_cache: Option<PathBuf>,
    pub path_bc2_cache: Option<PathBuf>,
    pub update_cache: bool,

    pub path_stats: Option<PathBuf>,
}

pub struct Runtime {
    pub opseq: Vec<u8>,
    pub min_opseq_score: f64,
    //Fraction of the best possible score a call needs
    pub threshold: f64,
    pub chunk_size: usize,
    pub min_cache_count: f64,
    pub na: String,
}

pub struct Threading {
    pub threads_work: usize,
    pub queue_capacity: usize,
    pub queue_timeout: Duration,
    pub report_interval: Duration,
}
