use log::info;
use std::path::{Path, PathBuf};

use clap::Args;
use itertools::Itertools;

use crate::common::{
    DEFAULT_BAM_TAGS, DEFAULT_CELL_TEMPLATE, DEFAULT_FQ_QUAL, DEFAULT_LOG_LEVEL, DEFAULT_NA,
    DEFAULT_PATH_LOG, DEFAULT_PATH_OUT, DEFAULT_PATH_READ1, DEFAULT_PATH_STATS,
    DEFAULT_RAW_TEMPLATE, DEFAULT_SAMPLE, DEFAULT_UMI_TEMPLATE,
};
use crate::fileformat::output::{parse_bam_tags, OutFormat, OutputConfig};
use crate::fileformat::template::Template;
use crate::runtime::{self, Error, LogLevel, LogMode};

///////////////////////////////
/// Options shared by every subcommand: input, output layout, templates and logging
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, default_value = DEFAULT_SAMPLE, help = "Sample name, used for read groups and log lines")]
    pub sample: String,

    #[arg(long = "read1", default_value = DEFAULT_PATH_READ1, help = "Read 1 FASTQ, carrying barcodes and UMI")]
    pub path_r1: PathBuf,
    #[arg(long = "read2", help = "Read 2 FASTQ, the cDNA insert. Required for BAM output")]
    pub path_r2: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CELL_TEMPLATE, help = "Template for the cell barcode")]
    pub cell: String,
    #[arg(long = "cell-raw", default_value = DEFAULT_RAW_TEMPLATE, help = "Template for the uncorrected cell barcode")]
    pub cell_raw: String,
    #[arg(long = "umi", default_value = DEFAULT_UMI_TEMPLATE, help = "Template for the UMI")]
    pub umi: String,
    #[arg(long = "bam-tags", default_value = DEFAULT_BAM_TAGS, help = "Comma-separated TAG:template pairs added to each BAM record")]
    pub bam_tags: String,

    #[arg(long = "out-format", value_enum, default_value_t = OutFormat::Bam)]
    pub out_format: OutFormat,
    #[arg(long = "out-assigned", default_value = DEFAULT_PATH_OUT)]
    pub path_out_assigned: PathBuf,
    #[arg(long = "out-unassigned", default_value = DEFAULT_PATH_OUT, help = "Unassigned reads. Shares the writer if equal to --out-assigned")]
    pub path_out_unassigned: PathBuf,
    #[arg(long = "save-stats", default_value = DEFAULT_PATH_STATS, help = "Run statistics file. Empty to skip")]
    pub path_stats: String,

    #[arg(long = "log-file", default_value = DEFAULT_PATH_LOG, help = "Log file, appended to. Empty to log to the terminal only")]
    pub path_log: String,
    #[arg(long = "log-level", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: LogLevel,
    #[arg(long = "log-mode", default_value = "both", help = "both, path, terminal or discard")]
    pub log_mode: LogMode,

    #[arg(long, default_value = DEFAULT_NA, help = "Code written for barcodes that could not be called")]
    pub na: String,
    #[arg(long = "fq-qual", default_value_t = DEFAULT_FQ_QUAL, help = "Quality character for FASTQ output")]
    pub fq_qual: char,
}

impl CommonArgs {
    pub fn init_logging(&self) -> anyhow::Result<()> {
        let mode = match self.log_mode {
            LogMode::Both | LogMode::Path if self.path_log.is_empty() => {
                LogMode::Terminal
            }
            mode => mode,
        };
        runtime::setup_global_logger(
            self.log_level,
            mode,
            Path::new(&self.path_log),
            &self.sample,
        )?;
        info!("Run started: {}", std::env::args().join(" "));
        Ok(())
    }

    pub fn path_stats(&self) -> Option<&Path> {
        Some(Path::new(&self.path_stats)).filter(|p| !p.as_os_str().is_empty())
    }

    ///////////////////////////////
    /// Validate the output options and compile the templates. Barcode fields are
    /// only meaningful when barcode references are used
    pub fn output_config(&self, has_refs: bool) -> anyhow::Result<OutputConfig> {
        if self.out_format == OutFormat::Bam && self.path_r2.is_none() {
            anyhow::bail!("BAM output stores read 2 and requires --read2");
        }
        if !self.fq_qual.is_ascii_graphic() {
            anyhow::bail!("--fq-qual must be a printable ASCII character, got {:?}", self.fq_qual);
        }

        let cell = Template::parse_base(&self.cell)?;
        let raw = Template::parse_base(&self.cell_raw)?;
        let umi = Template::parse_base(&self.umi)?;
        if !has_refs {
            for template in [&cell, &raw] {
                if template.needs_barcodes() {
                    return Err(Error::template(
                        template.source(),
                        "barcode fields require barcode references",
                    )
                    .into());
                }
            }
        }

        Ok(OutputConfig {
            format: self.out_format,
            path_assigned: self.path_out_assigned.clone(),
            path_unassigned: self.path_out_unassigned.clone(),
            sample: self.sample.clone(),
            cell,
            umi,
            raw,
            bam_tags: parse_bam_tags(&self.bam_tags)?,
            fq_qual: self.fq_qual as u8,
        })
    }
}
