mod abort;

pub use abort::*;
