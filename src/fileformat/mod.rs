pub mod fasta;
pub mod fastq;
pub mod output;
pub mod template;

pub use output::{OutFormat, Output, OutputConfig};
pub use template::{Field, FieldSource, Template};
