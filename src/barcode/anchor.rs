use bio::alignment::pairwise::{Aligner, MatchParams};

use crate::common::ANCHOR_FLANK;

// Scores are doubled so the half-point mismatch penalty stays integral.
// Unscaled: match 2, mismatch -1.5, gap of length n costs 3 + (n - 1)
const MATCH: i32 = 4;
const MISMATCH: i32 = -3;
const GAP_OPEN: i32 = -4;
const GAP_EXTEND: i32 = -2;
const SCORE_SCALE: f64 = 2.0;

///////////////////////////////
/// Location of the primer in read 1
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorAlignment {
    /// First read base of the aligned primer; BC1 ends here
    pub query_start: usize,
    /// One past the last aligned read base; BC2 starts here
    pub query_end: usize,
    /// Primer bases left unaligned before the alignment
    pub start_gap_length: usize,
    /// Primer bases left unaligned after the alignment
    pub end_gap_length: usize,
    pub score: f64,
}

///////////////////////////////
/// Local aligner for the fixed primer separating BC1 and BC2
pub struct AnchorAligner {
    opseq: Vec<u8>,
    min_score: f64,
    aligner: Aligner<MatchParams>,
}

impl AnchorAligner {
    pub fn new(opseq: &[u8], min_score: f64) -> AnchorAligner {
        AnchorAligner {
            opseq: opseq.to_ascii_uppercase(),
            min_score,
            aligner: Aligner::new(GAP_OPEN, GAP_EXTEND, MatchParams::new(MATCH, MISMATCH)),
        }
    }

    ///////////////////////////////
    /// Align the primer against a read. None if the primer is missing, too weak,
    /// too close to either end, or its unaligned overhang runs off the read
    pub fn locate(&mut self, read: &[u8]) -> Option<AnchorAlignment> {
        if read.is_empty() || self.opseq.is_empty() {
            return None;
        }
        let aln = self.aligner.local(&self.opseq, read);
        let score = aln.score as f64 / SCORE_SCALE;

        let query_start = aln.ystart;
        let query_end = aln.yend;
        if query_start < ANCHOR_FLANK
            || query_end + ANCHOR_FLANK > read.len()
            || score < self.min_score
        {
            return None;
        }

        let start_gap_length = aln.xstart;
        let end_gap_length = self.opseq.len() - aln.xend;
        // primer overhang would reach the first base of the read
        if start_gap_length >= query_start {
            return None;
        }
        // primer overhang would reach into the protected 3' flank
        if end_gap_length > 0 && query_end + end_gap_length + ANCHOR_FLANK > read.len() {
            return None;
        }

        Some(AnchorAlignment {
            query_start,
            query_end,
            start_gap_length,
            end_gap_length,
            score,
        })
    }
}
