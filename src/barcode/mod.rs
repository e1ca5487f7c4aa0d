pub mod anchor;
pub mod matcher;
pub mod reference;
pub mod tiebreaker;

pub use anchor::{AnchorAligner, AnchorAlignment};
pub use matcher::{BarcodeMatcher, MatchResult};
pub use reference::{score_window, ReferenceSet, Side};
pub use tiebreaker::{CacheSnapshot, Resolution, TieBreaker};
