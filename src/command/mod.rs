pub mod combinatorial;
pub mod dropseq;
pub mod options;

pub use combinatorial::Command as Combinatorial;
pub use dropseq::Command as Dropseq;
pub use options::CommonArgs;
