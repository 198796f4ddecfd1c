//! Distance primitives and ranking for visual descriptors.

use std::cmp::Ordering;

use crate::types::{Distance, RankedMatch};

/// Euclidean distance between two equal-length vectors.
///
/// Accumulates in f64. Extra trailing elements of the longer slice are
/// ignored; callers check lengths first.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Mean absolute difference between two equal-length vectors.
pub fn mean_abs_difference(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }

    let total: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64 - *y as f64).abs())
        .sum();
    total / n as f64
}

/// Rank candidates by a fallible distance function, closest first.
///
/// Candidates whose distance is the incomparable sentinel rank last and are
/// flagged `comparable: false`. Ties keep input order. The first error
/// aborts the ranking.
pub fn rank<T, E, F>(query: &T, candidates: &[T], top_k: usize, distance: F) -> Result<Vec<RankedMatch>, E>
where
    F: Fn(&T, &T) -> Result<Distance, E>,
{
    let mut matches = Vec::with_capacity(candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        let d = distance(query, candidate)?;
        matches.push(RankedMatch {
            id: i as u64,
            distance: d,
            comparable: !d.is_max(),
        });
    }

    sort_matches(&mut matches);
    matches.truncate(top_k);
    Ok(matches)
}

/// Stable ascending sort by distance; the sentinel naturally sorts last.
pub(crate) fn sort_matches(matches: &mut [RankedMatch]) {
    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert_eq!(euclidean_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_euclidean_known() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_euclidean_symmetric() {
        let a = [0.1, 0.7, 0.33];
        let b = [0.9, 0.2, 0.5];
        assert_eq!(euclidean_distance(&a, &b), euclidean_distance(&b, &a));
    }

    #[test]
    fn test_mean_abs_empty() {
        assert_eq!(mean_abs_difference(&[], &[]), 0.0);
    }

    #[test]
    fn test_mean_abs_known() {
        let d = mean_abs_difference(&[0.0, 1.0], &[0.5, 0.5]);
        assert!((d - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_with_sentinel_last() {
        let candidates = vec![Some(5.0), None, Some(1.0), Some(5.0)];
        let dist = |a: &Option<f64>, b: &Option<f64>| -> Result<Distance, ()> {
            Ok(match (a, b) {
                (Some(x), Some(y)) => Distance::new((x - y).abs()),
                _ => Distance::MAX,
            })
        };

        let ranked = rank(&Some(0.0), &candidates, 10, dist).unwrap();
        let ids: Vec<u64> = ranked.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 0, 3, 1]);
        assert!(!ranked[3].comparable);
        assert!(ranked[..3].iter().all(|m| m.comparable));
    }

    #[test]
    fn test_rank_top_k() {
        let candidates = vec![3.0, 1.0, 2.0];
        let ranked = rank(&0.0, &candidates, 2, |a: &f64, b: &f64| {
            Ok::<_, ()>(Distance::new((a - b).abs()))
        })
        .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, 1);
    }

    #[test]
    fn test_rank_propagates_error() {
        let result = rank(&0.0, &[1.0], 1, |_: &f64, _: &f64| Err::<Distance, _>("mismatch"));
        assert_eq!(result.unwrap_err(), "mismatch");
    }
}
