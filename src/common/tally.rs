use std::collections::BTreeMap;

///////////////////////////////
/// Ordered counter with fractional weights. Used for run statistics and barcode usage
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tally {
    counts: BTreeMap<String, f64>,
}

impl Tally {
    pub fn new() -> Tally {
        Tally::default()
    }

    pub fn add(&mut self, key: &str, weight: f64) {
        match self.counts.get_mut(key) {
            Some(v) => *v += weight,
            None => {
                self.counts.insert(key.to_string(), weight);
            }
        }
    }

    pub fn incr(&mut self, key: &str) {
        self.add(key, 1.0);
    }

    pub fn get(&self, key: &str) -> f64 {
        self.counts.get(key).copied().unwrap_or(0.0)
    }

    pub fn merge(&mut self, other: &Tally) {
        for (k, v) in &other.counts {
            self.add(k, *v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
