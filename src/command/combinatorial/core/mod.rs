pub mod collector;
pub mod core;
pub mod dispatch;
pub mod params;
pub mod worker;

pub use collector::{collect_ordered, CollectorReport, RecordSink};
pub use self::core::{run, RunSummary};
pub use dispatch::{dispatch, Chunker};
pub use worker::{Worker, WorkerReport};
