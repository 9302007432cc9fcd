//! Search result type. Node identity (`NounId`) is shared with every other
//! crate via `brainy_core`.

pub use brainy_core::NounId;
use crate::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Result of a vector similarity search. `score` is the metric's native
/// value (cosine similarity, raw Euclidean distance, ...), never the
/// internal min-heap distance used during graph traversal.
///
/// There is no metric-agnostic notion of "better" for this type alone —
/// for `Cosine`/`DotProduct` a higher score wins, for `Euclidean`/
/// `Manhattan` a lower one does — so ordering is done via
/// [`SearchResult::cmp_by_metric`] rather than a blanket `Ord` impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: NounId,
    pub score: f32,
}

impl SearchResult {
    pub fn new(id: NounId, score: f32) -> Self {
        Self { id, score }
    }

    /// Orders two results best-first under `metric`: descending by score
    /// when higher is better, ascending when lower is better. Ties break
    /// on `id` so ordering is deterministic.
    pub fn cmp_by_metric(&self, other: &Self, metric: DistanceMetric) -> std::cmp::Ordering {
        let by_score = if metric.higher_is_better() {
            other.score.partial_cmp(&self.score)
        } else {
            self.score.partial_cmp(&other.score)
        };
        by_score
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && (self.score - other.score).abs() < f32::EPSILON
    }
}

impl Eq for SearchResult {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_ordering_higher_is_better() {
        let mut results = vec![
            SearchResult::new("a".to_string(), 0.5),
            SearchResult::new("b".to_string(), 0.9),
            SearchResult::new("c".to_string(), 0.2),
        ];

        results.sort_by(|a, b| a.cmp_by_metric(b, DistanceMetric::Cosine));

        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
        assert_eq!(results[2].id, "c");
    }

    #[test]
    fn test_search_result_tie_break_is_lexicographic() {
        let mut results = vec![
            SearchResult::new("zeta".to_string(), 0.5),
            SearchResult::new("alpha".to_string(), 0.5),
        ];
        results.sort_by(|a, b| a.cmp_by_metric(b, DistanceMetric::Cosine));
        assert_eq!(results[0].id, "alpha");
    }

    #[test]
    fn test_search_result_ordering_lower_is_better() {
        let mut results = vec![
            SearchResult::new("far".to_string(), 5.0),
            SearchResult::new("near".to_string(), 0.1),
            SearchResult::new("mid".to_string(), 2.0),
        ];

        results.sort_by(|a, b| a.cmp_by_metric(b, DistanceMetric::Euclidean));

        assert_eq!(results[0].id, "near");
        assert_eq!(results[1].id, "mid");
        assert_eq!(results[2].id, "far");
    }
}
