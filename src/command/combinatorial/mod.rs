pub mod command;
pub mod constants;
pub mod core;
pub mod stats;

pub use command::Command;
pub use self::core::{run, RunSummary};
