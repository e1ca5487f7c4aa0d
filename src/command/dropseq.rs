use log::{error, info};
use std::path::Path;

use clap::Args;

use crate::command::combinatorial::stats::{report_stats, save_stats};
use crate::command::options::CommonArgs;
use crate::common::{OutputRecord, Tally};
use crate::fileformat::fastq::PairedFastqSource;
use crate::fileformat::output::{Output, OutputConfig};

// Reads between intermediate statistics reports
const DROPSEQ_REPORT_EVERY: u64 = 100_000;

///////////////////////////////
/// Cell barcode and UMI sit at fixed positions in read 1; every read is assigned
#[derive(Args)]
pub struct Command {
    #[command(flatten)]
    common: CommonArgs,
}

impl Command {
    pub fn try_execute(&mut self) -> anyhow::Result<()> {
        self.common.init_logging()?;
        let output_config = self.common.output_config(false)?;
        passthrough(
            &self.common.path_r1,
            self.common.path_r2.as_deref(),
            output_config,
            &self.common.na,
            self.common.path_stats(),
        )?;
        Ok(())
    }
}

///////////////////////////////
/// Write every read pair as assigned, in input order. Returns the run counters
pub fn passthrough(
    path_r1: &Path,
    path_r2: Option<&Path>,
    output_config: OutputConfig,
    na: &str,
    path_stats: Option<&Path>,
) -> anyhow::Result<Tally> {
    let mut output = Output::new(output_config)?;
    let mut tally = Tally::new();
    tally.add("total", 0.0);

    for (n, read) in PairedFastqSource::open(path_r1, path_r2)?.enumerate() {
        let mut record = OutputRecord::unresolved(read?, na);
        record.assigned = true;
        output.write(&record)?;
        tally.incr("total");

        let n = n as u64;
        if n > 0 && n % DROPSEQ_REPORT_EVERY == 0 {
            report_stats(&tally, "");
        }
    }
    output.close()?;

    if tally.get("total") > 0.0 {
        info!("Run completed. {} reads written", tally.get("total"));
    } else {
        error!("No reads were processed!");
    }
    if let Some(path) = path_stats {
        save_stats(path, &tally, None)?;
    }
    Ok(tally)
}
