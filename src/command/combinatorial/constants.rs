pub const COMBINATORIAL_DEFAULT_PARALLEL: usize = 1;
pub const COMBINATORIAL_DEFAULT_CHUNK_SIZE: usize = 1000;
pub const COMBINATORIAL_DEFAULT_OPSEQ: &str = "GAATCACGATACGTACACCAGT";
pub const COMBINATORIAL_DEFAULT_MIN_OPSEQ_SCORE: f64 = 22.0;
pub const COMBINATORIAL_DEFAULT_THRESHOLD: f64 = 0.5;
pub const COMBINATORIAL_DEFAULT_MIN_CACHE_COUNT: f64 = 2.0;

// Chunk queue slots per worker
pub const COMBINATORIAL_QUEUE_SLOTS_PER_WORKER: usize = 5;
pub const COMBINATORIAL_QUEUE_TIMEOUT_MS: u64 = 1000;
pub const COMBINATORIAL_REPORT_INTERVAL_SECS: u64 = 30;
