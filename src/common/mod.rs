mod consts;
mod readpair;
mod record;
mod tally;

pub use consts::*;
pub use readpair::*;
pub use record::OutputRecord;
pub use tally::Tally;
