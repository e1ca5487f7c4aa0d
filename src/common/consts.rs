// Name used for "no confident call" in cache files and statistics
pub const NO_CALL: &str = "NNNNNNNN";

pub const READ2_PLACEHOLDER: &[u8] = b"READ2 IS NOT AVAILABLE";

// Bases kept clear of the primer at either end of read 1
pub const ANCHOR_FLANK: usize = 8;

// Fallback barcode windows used before the primer is located
pub const FALLBACK_BARCODE_LEN: usize = 12;

pub const DEFAULT_SAMPLE: &str = "NA";
pub const DEFAULT_PATH_READ1: &str = "/dev/stdin";
pub const DEFAULT_PATH_OUT: &str = "/dev/stdout";
pub const DEFAULT_PATH_STATS: &str = "preprocessing_stats.txt";
pub const DEFAULT_PATH_LOG: &str = "preprocessing_run.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_NA: &str = NO_CALL;
pub const DEFAULT_FQ_QUAL: char = 'E';

pub const DEFAULT_CELL_TEMPLATE: &str = "{r1[8:20][::-1]}";
pub const DEFAULT_UMI_TEMPLATE: &str = "{r1[0:8]}";
pub const DEFAULT_RAW_TEMPLATE: &str = "";
pub const DEFAULT_BAM_TAGS: &str = "CB:{cell},MI:{UMI},RG:{assigned}";
