//! Random term sets for property-style tests.

use std::collections::BTreeSet;

/// Generates up to `count` distinct ascending int ids drawn from `ids`, each
/// with a non-empty ascending posting list of doc ids below `num_docs`.
pub fn random_int_terms(
    rng: &mut fastrand::Rng,
    count: usize,
    ids: std::ops::Range<i64>,
    num_docs: i64,
) -> Vec<(i64, Vec<i64>)> {
    assert!(num_docs > 0);
    let ids = (0..count)
        .map(|_| rng.i64(ids.clone()))
        .collect::<BTreeSet<_>>();
    ids.into_iter()
        .map(|id| (id, random_posting(rng, num_docs)))
        .collect()
}

/// Generates up to `count` distinct ascending lowercase terms of 1 to
/// `max_len` bytes, each with a posting list of doc ids below `num_docs`.
pub fn random_string_terms(
    rng: &mut fastrand::Rng,
    count: usize,
    max_len: usize,
    num_docs: i64,
) -> Vec<(String, Vec<i64>)> {
    assert!(max_len > 0 && num_docs > 0);
    let terms = (0..count)
        .map(|_| {
            let len = rng.usize(1..=max_len);
            (0..len).map(|_| rng.lowercase()).collect::<String>()
        })
        .collect::<BTreeSet<_>>();
    terms
        .into_iter()
        .map(|term| (term, random_posting(rng, num_docs)))
        .collect()
}

/// A non-empty ascending posting list of distinct doc ids below `num_docs`.
pub fn random_posting(rng: &mut fastrand::Rng, num_docs: i64) -> Vec<i64> {
    let len = rng.usize(1..=(num_docs as usize).min(8));
    let docs = (0..len)
        .map(|_| rng.i64(0..num_docs))
        .collect::<BTreeSet<_>>();
    docs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_int_terms() {
        let mut rng = fastrand::Rng::with_seed(7);
        let terms = random_int_terms(&mut rng, 50, -100..100, 20);
        assert!(!terms.is_empty());
        assert!(terms.windows(2).all(|w| w[0].0 < w[1].0));
        for (_, docs) in &terms {
            assert!(!docs.is_empty());
            assert!(docs.windows(2).all(|w| w[0] < w[1]));
            assert!(docs.iter().all(|&d| (0..20).contains(&d)));
        }
    }

    #[test]
    fn test_random_string_terms() {
        let mut rng = fastrand::Rng::with_seed(11);
        let terms = random_string_terms(&mut rng, 30, 4, 5);
        assert!(terms.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
