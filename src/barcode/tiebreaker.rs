use log::{debug, warn};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use super::matcher::BarcodeMatcher;
use crate::common::{Tally, NO_CALL};

///////////////////////////////
/// Outcome of resolving one query. Never changed once cached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Call {
        name: String,
        sequence: Vec<u8>,
        score: i32,
    },
    NoCall {
        score: i32,
    },
}

impl Resolution {
    pub fn score(&self) -> i32 {
        match self {
            Resolution::Call { score, .. } | Resolution::NoCall { score } => *score,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Resolution::Call { .. })
    }

    ///////////////////////////////
    /// Barcode name, or the no-call sentinel
    pub fn name(&self) -> &str {
        match self {
            Resolution::Call { name, .. } => name,
            Resolution::NoCall { .. } => NO_CALL,
        }
    }

    pub fn sequence(&self) -> &[u8] {
        match self {
            Resolution::Call { sequence, .. } => sequence,
            Resolution::NoCall { .. } => NO_CALL.as_bytes(),
        }
    }
}

///////////////////////////////
/// One row of the cache file: query, matched sequence, matched name, score, count
#[derive(Debug, Deserialize)]
struct CacheRow {
    query: String,
    sequence: String,
    name: String,
    score: i32,
    #[allow(dead_code)]
    count: Option<f64>,
}

///////////////////////////////
/// Memoizing resolver on top of a BarcodeMatcher. Counts are weighted so that
/// a read spread over several candidate windows contributes 1 in total
#[derive(Clone, Debug)]
pub struct TieBreaker {
    matcher: BarcodeMatcher,
    cache: FxHashMap<Vec<u8>, Resolution>,
    query_count: FxHashMap<Vec<u8>, f64>,
    name_count: Tally,
    n_hit: f64,
    n_align: f64,
}

impl TieBreaker {
    pub fn new(matcher: BarcodeMatcher) -> TieBreaker {
        TieBreaker {
            matcher,
            cache: FxHashMap::default(),
            query_count: FxHashMap::default(),
            name_count: Tally::new(),
            n_hit: 0.0,
            n_align: 0.0,
        }
    }

    pub fn matcher(&self) -> &BarcodeMatcher {
        &self.matcher
    }

    pub fn resolve(&mut self, query: &[u8], weight: f64) -> Resolution {
        match self.query_count.get_mut(query) {
            Some(c) => *c += weight,
            None => {
                self.query_count.insert(query.to_vec(), weight);
            }
        }

        let resolution = match self.cache.get(query) {
            Some(cached) => {
                self.n_hit += weight;
                cached.clone()
            }
            None => {
                self.n_align += weight;
                let result = self.matcher.find_best(query);
                let unique = result
                    .names
                    .first()
                    .filter(|first| result.names.iter().all(|n| n == *first));
                let resolution = match unique {
                    Some(name) => Resolution::Call {
                        name: name.to_string(),
                        sequence: result.sequences[0].to_vec(),
                        score: result.score,
                    },
                    None => Resolution::NoCall {
                        score: result.score,
                    },
                };
                self.cache.insert(query.to_vec(), resolution.clone());
                resolution
            }
        };

        self.name_count.add(resolution.name(), weight);
        self.name_count.add("total", weight);
        resolution
    }

    ///////////////////////////////
    /// Resolve each candidate window at weight 1/n and pick the unique best call.
    /// Returns the resolution and the index of the chosen candidate
    pub fn resolve_choices(&mut self, candidates: &[&[u8]]) -> (Resolution, usize) {
        if candidates.is_empty() {
            return (Resolution::NoCall { score: -1 }, 0);
        }
        let weight = 1.0 / candidates.len() as f64;
        let results: Vec<Resolution> = candidates
            .iter()
            .map(|c| self.resolve(c, weight))
            .collect();

        let best_score = results
            .iter()
            .filter(|r| r.is_call())
            .map(|r| r.score())
            .max();
        let Some(best_score) = best_score else {
            // nothing called; report the first candidate as is
            return (results[0].clone(), 0);
        };

        let mut best = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_call() && r.score() == best_score);
        match (best.next(), best.next()) {
            (Some((i, r)), None) => (r.clone(), i),
            _ => (Resolution::NoCall { score: best_score }, 0),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn n_hit(&self) -> f64 {
        self.n_hit
    }

    pub fn n_align(&self) -> f64 {
        self.n_align
    }

    pub fn name_count(&self) -> &Tally {
        &self.name_count
    }

    ///////////////////////////////
    /// Pre-populate the cache from a TSV file. Any problem leaves the cache untouched
    pub fn load_cache(&mut self, path: &Path) {
        if path.as_os_str().is_empty() {
            return;
        }
        debug!("pre-populating alignment cache from {:?}", path);
        match read_cache_file(path) {
            Ok(entries) => {
                for (query, resolution) in entries {
                    self.cache.entry(query).or_insert(resolution);
                }
                debug!("loaded {} queries.", self.cache.len());
            }
            Err(e) => {
                warn!("error while loading cache {:?}: {}", path, e);
            }
        }
    }

    ///////////////////////////////
    /// Hand over the accumulated state once the worker is done
    pub fn into_snapshot(self) -> CacheSnapshot {
        CacheSnapshot {
            cache: self.cache,
            query_count: self.query_count,
            name_count: self.name_count,
            n_hit: self.n_hit,
            n_align: self.n_align,
        }
    }
}

///////////////////////////////
/// Cache and counters of one or more finished tie-breakers
#[derive(Clone, Debug, Default)]
pub struct CacheSnapshot {
    pub cache: FxHashMap<Vec<u8>, Resolution>,
    pub query_count: FxHashMap<Vec<u8>, f64>,
    pub name_count: Tally,
    pub n_hit: f64,
    pub n_align: f64,
}

impl CacheSnapshot {
    pub fn merge(&mut self, other: CacheSnapshot) {
        for (query, resolution) in other.cache {
            self.cache.entry(query).or_insert(resolution);
        }
        for (query, count) in other.query_count {
            *self.query_count.entry(query).or_insert(0.0) += count;
        }
        self.name_count.merge(&other.name_count);
        self.n_hit += other.n_hit;
        self.n_align += other.n_align;
    }

    pub fn store_cache(&self, path: &Path, min_count: f64) -> anyhow::Result<usize> {
        write_cache_file(path, &self.cache, &self.query_count, min_count)
    }
}

fn read_cache_file(path: &Path) -> anyhow::Result<Vec<(Vec<u8>, Resolution)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut entries = Vec::new();
    for row in reader.deserialize() {
        let row: CacheRow = row?;
        let resolution = if row.name == NO_CALL {
            Resolution::NoCall { score: row.score }
        } else {
            Resolution::Call {
                name: row.name,
                sequence: row.sequence.into_bytes(),
                score: row.score,
            }
        };
        entries.push((row.query.into_bytes(), resolution));
    }
    Ok(entries)
}

fn write_cache_file(
    path: &Path,
    cache: &FxHashMap<Vec<u8>, Resolution>,
    query_count: &FxHashMap<Vec<u8>, f64>,
    min_count: f64,
) -> anyhow::Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    let mut queries: Vec<&Vec<u8>> = cache.keys().collect();
    queries.sort();

    let mut n_written = 0;
    for query in queries {
        let count = query_count.get(query).copied().unwrap_or(0.0);
        if count < min_count {
            continue;
        }
        let resolution = &cache[query];
        writer.write_record([
            query.as_slice(),
            resolution.sequence(),
            resolution.name().as_bytes(),
            resolution.score().to_string().as_bytes(),
            count.to_string().as_bytes(),
        ])?;
        n_written += 1;
    }
    writer.flush()?;
    debug!("stored {} cached queries in {:?}", n_written, path);
    Ok(n_written)
}
