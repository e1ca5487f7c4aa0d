use super::reference::{score_window, ReferenceSet};

///////////////////////////////
/// All references tied at the best score. Empty with score -1 when nothing could be scored
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult<'a> {
    pub names: Vec<&'a str>,
    pub sequences: Vec<&'a [u8]>,
    pub score: i32,
}

impl<'a> MatchResult<'a> {
    pub fn no_call() -> MatchResult<'a> {
        MatchResult {
            names: Vec::new(),
            sequences: Vec::new(),
            score: -1,
        }
    }

    pub fn is_no_call(&self) -> bool {
        self.names.is_empty()
    }
}

///////////////////////////////
/// Scores a query against the references of matching length
#[derive(Clone, Debug)]
pub struct BarcodeMatcher {
    refs: ReferenceSet,
}

impl BarcodeMatcher {
    pub fn new(refs: ReferenceSet) -> BarcodeMatcher {
        BarcodeMatcher { refs }
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.refs
    }

    pub fn find_best(&self, query: &[u8]) -> MatchResult<'_> {
        if query.len() < self.refs.min_len() {
            return MatchResult::no_call();
        }
        // longer queries are compared against the longest references, truncated
        let len = query.len().min(self.refs.max_len());
        let Some((members, costs)) = self.refs.bucket(len) else {
            return MatchResult::no_call();
        };

        let mut best = MatchResult::no_call();
        let mut best_score = i32::MIN;
        for &i in members {
            let reference = self.refs.sequence(i);
            let score = score_window(query, reference, costs);
            if score > best_score {
                best_score = score;
                best.names.clear();
                best.sequences.clear();
            }
            if score == best_score {
                best.names.push(self.refs.name(i));
                best.sequences.push(reference);
            }
        }
        if !best.names.is_empty() {
            best.score = best_score;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::Side;

    fn matcher() -> BarcodeMatcher {
        BarcodeMatcher::new(
            ReferenceSet::new(
                vec![
                    ("bc_a".to_string(), b"AAAACCCC".to_vec()),
                    ("bc_b".to_string(), b"GGGGTTTT".to_vec()),
                    ("bc_c".to_string(), b"AAAACCCG".to_vec()),
                    ("bc_long".to_string(), b"ACGTACGTAC".to_vec()),
                ],
                Side::Left,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_exact_hit() {
        let m = matcher();
        let res = m.find_best(b"GGGGTTTT");
        assert_eq!(res.names, vec!["bc_b"]);
        assert_eq!(res.score, 16);
    }

    #[test]
    fn test_ties_returned() {
        let m = matcher();
        // last base differs from both bc_a and bc_c
        let res = m.find_best(b"AAAACCCT");
        assert_eq!(res.names, vec!["bc_a", "bc_c"]);
        assert_eq!(res.score, 14 - 3);
    }

    #[test]
    fn test_short_query() {
        let m = matcher();
        let res = m.find_best(b"AAAA");
        assert!(res.is_no_call());
        assert_eq!(res.score, -1);
    }

    #[test]
    fn test_empty_bucket_and_long_query() {
        let m = matcher();
        // no references of length 9
        assert!(m.find_best(b"AAAACCCCA").is_no_call());
        // longer than any reference: truncated against the length-10 bucket
        let res = m.find_best(b"ACGTACGTACGGGG");
        assert_eq!(res.names, vec!["bc_long"]);
        assert_eq!(res.score, 20);
    }

    #[test]
    fn test_deterministic() {
        let m = matcher();
        assert_eq!(m.find_best(b"AAAACCCA"), m.find_best(b"AAAACCCA"));
    }
}
