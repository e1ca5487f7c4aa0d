use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use env_logger::Target;

#[derive(Clone, Copy, Debug)]
pub struct LogLevel(pub log::LevelFilter);
impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" | "warning" => log::LevelFilter::Warn,
            "error" | "critical" | "crit" => log::LevelFilter::Error,
            "off" | "none" => log::LevelFilter::Off,
            _ => return Err(format!("Invalid log level: {}", s)),
        };
        Ok(LogLevel(level))
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.0
    }
}

#[derive(Clone, Copy, Debug)]
pub enum LogMode {
    Both,
    Path,
    Terminal,
    Discard,
}
impl std::str::FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s.to_lowercase().as_str() {
            "both" => LogMode::Both,
            "path" | "file" => LogMode::Path,
            "terminal" | "term" | "cli" => LogMode::Terminal,
            "discard" | "none" => LogMode::Discard,
            _ => return Err(format!("Invalid log mode: {}", s)),
        };
        Ok(mode)
    }
}

///////////////////////////////
/// Sink duplicating every formatted log line to stderr and/or an append-mode file
struct TeeWriter {
    terminal: bool,
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.terminal {
            std::io::stderr().write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.terminal {
            std::io::stderr().flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

///////////////////////////////
/// Install the global logger. Lines are tab separated: time, level, sample, target, message
pub fn setup_global_logger(
    log_level: LogLevel,
    log_mode: LogMode,
    log_path: &Path,
    sample: &str,
) -> anyhow::Result<()> {
    let file = match log_mode {
        LogMode::Both | LogMode::Path => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .map_err(|e| anyhow::anyhow!("Failed to open log file {:?}: {}", log_path, e))?,
        ),
        LogMode::Terminal | LogMode::Discard => None,
    };
    let terminal = matches!(log_mode, LogMode::Both | LogMode::Terminal);
    let level = match log_mode {
        LogMode::Discard => log::LevelFilter::Off,
        _ => log_level.0,
    };

    let sample = sample.to_string();
    env_logger::Builder::new()
        .filter_level(level)
        .format(move |buf, record| {
            writeln!(
                buf,
                "{}\t{}\t{}\t{}\t{}",
                buf.timestamp_millis(),
                record.level(),
                sample,
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { terminal, file })))
        .try_init()?;
    Ok(())
}
