use log::debug;
use std::path::Path;

use crate::fileformat::fasta::read_named_sequences;
use crate::runtime::Error;

///////////////////////////////
/// Which side of the primer a barcode set sits on. Decides the positional weighting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// BC1, upstream of the primer. The 3' end (next to the primer) weighs most
    Left,
    /// BC2, downstream of the primer. Position 0 is error-prone and free
    Right,
}

impl Side {
    pub fn cost_vector(&self, len: usize) -> Vec<i32> {
        let mut cost = vec![1; len];
        match self {
            Side::Left => {
                for c in &mut cost[len.saturating_sub(8)..] {
                    *c = 2;
                }
                // diagnostic 4-mer
                for c in &mut cost[len.saturating_sub(4)..] {
                    *c = 3;
                }
            }
            Side::Right => {
                if len > 0 {
                    cost[0] = 0;
                }
                for c in cost.iter_mut().take(8).skip(1) {
                    *c = 2;
                }
                // diagnostic 4-mer
                for c in cost.iter_mut().take(8).skip(4) {
                    *c = 3;
                }
            }
        }
        cost
    }
}

///////////////////////////////
/// Weighted Hamming score of a query against a reference. Zips all three inputs,
/// so positions past the shortest are ignored
#[inline(always)]
pub fn score_window(query: &[u8], reference: &[u8], costs: &[i32]) -> i32 {
    let mut score = 0;
    for ((&q, &r), &c) in query.iter().zip(reference).zip(costs) {
        if q == r {
            score += 2;
        } else {
            // first base of BC2 is frequently read as A
            if q == b'A' && c == 0 {
                score += 1;
            }
            score -= c;
        }
    }
    score
}

///////////////////////////////
/// Named reference barcodes, bucketed by length with one cost vector per length
#[derive(Clone, Debug)]
pub struct ReferenceSet {
    names: Vec<String>,
    sequences: Vec<Vec<u8>>,
    min_len: usize,
    max_len: usize,
    //Indexed by length - min_len
    buckets: Vec<Vec<usize>>,
    costs: Vec<Vec<i32>>,
}

impl ReferenceSet {
    pub fn new(entries: Vec<(String, Vec<u8>)>, side: Side) -> Result<ReferenceSet, Error> {
        if entries.is_empty() {
            return Err(Error::parse_error(
                "barcode references",
                Some("no reference sequences"),
            ));
        }
        let (names, sequences): (Vec<String>, Vec<Vec<u8>>) = entries.into_iter().unzip();

        let min_len = sequences.iter().map(|s| s.len()).min().unwrap_or(0);
        let max_len = sequences.iter().map(|s| s.len()).max().unwrap_or(0);

        let mut buckets = vec![Vec::new(); max_len - min_len + 1];
        for (i, s) in sequences.iter().enumerate() {
            buckets[s.len() - min_len].push(i);
        }
        let costs = (min_len..=max_len).map(|l| side.cost_vector(l)).collect();

        debug!(
            "initialized from {} sequences from lmin={} to lmax={}",
            names.len(),
            min_len,
            max_len
        );

        Ok(ReferenceSet {
            names,
            sequences,
            min_len,
            max_len,
            buckets,
            costs,
        })
    }

    pub fn from_fasta(path: &Path, side: Side) -> anyhow::Result<ReferenceSet> {
        debug!("loading target sequences from {:?}", path);
        let entries = read_named_sequences(path)?;
        if entries.is_empty() {
            return Err(Error::file_not_valid(path, Some("no FASTA records")).into());
        }
        Ok(ReferenceSet::new(entries, side)?)
    }

    pub fn n_references(&self) -> usize {
        self.names.len()
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    pub fn sequence(&self, i: usize) -> &[u8] {
        &self.sequences[i]
    }

    ///////////////////////////////
    /// Reference indices and cost vector for one length. None outside [min_len, max_len]
    pub fn bucket(&self, len: usize) -> Option<(&[usize], &[i32])> {
        if len < self.min_len || len > self.max_len {
            return None;
        }
        let i = len - self.min_len;
        Some((&self.buckets[i], &self.costs[i]))
    }
}
