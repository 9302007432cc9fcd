//! Distance metrics for vector similarity

use serde::{Deserialize, Serialize};

/// Distance metrics for measuring vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine similarity (1 - cosine distance)
    /// Range: [-1, 1], where 1 means identical direction
    /// Best for: Text embeddings, normalized vectors
    Cosine,

    /// Euclidean distance (L2 norm)
    /// Range: [0, ∞], where 0 means identical vectors
    /// Best for: Image embeddings, when magnitude matters
    Euclidean,

    /// Manhattan distance (L1 norm)
    /// Range: [0, ∞], where 0 means identical vectors
    /// Best for: High-dimensional sparse embeddings, grid-like feature spaces
    Manhattan,

    /// Dot product (inner product)
    /// Range: (-∞, ∞), higher means more similar
    /// Best for: Normalized vectors, when you want magnitude-weighted similarity
    DotProduct,
}

impl DistanceMetric {
    /// Calculate distance/similarity between two vectors
    ///
    /// Note: For Cosine and DotProduct, higher values mean more similar.
    /// For Euclidean and Manhattan, lower values mean more similar.
    pub fn calculate(&self, v1: &[f32], v2: &[f32]) -> f32 {
        assert_eq!(v1.len(), v2.len(), "Vectors must have same dimension");

        match self {
            DistanceMetric::Cosine => cosine_similarity(v1, v2),
            DistanceMetric::Euclidean => euclidean_distance(v1, v2),
            DistanceMetric::Manhattan => manhattan_distance(v1, v2),
            DistanceMetric::DotProduct => dot_product(v1, v2),
        }
    }

    /// Returns true if higher scores mean more similar (Cosine, DotProduct)
    /// Returns false if lower scores mean more similar (Euclidean, Manhattan)
    pub fn higher_is_better(&self) -> bool {
        matches!(self, DistanceMetric::Cosine | DistanceMetric::DotProduct)
    }
}

/// Calculate cosine similarity between two vectors
///
/// Returns a value in [-1, 1] where:
/// - 1.0 means vectors point in the same direction
/// - 0.0 means vectors are orthogonal
/// - -1.0 means vectors point in opposite directions
#[inline]
pub fn cosine_similarity(v1: &[f32], v2: &[f32]) -> f32 {
    let dot = dot_product(v1, v2);
    let mag1 = magnitude(v1);
    let mag2 = magnitude(v2);

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    dot / (mag1 * mag2)
}

/// Calculate Euclidean distance between two vectors
///
/// Returns the L2 norm of the difference between vectors.
/// Lower values indicate more similar vectors.
#[inline]
pub fn euclidean_distance(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter()
        .zip(v2.iter())
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum::<f32>()
        .sqrt()
}

/// Calculate Manhattan (L1) distance between two vectors
///
/// Returns the sum of absolute differences between components.
/// Lower values indicate more similar vectors.
#[inline]
pub fn manhattan_distance(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter().zip(v2.iter()).map(|(a, b)| (a - b).abs()).sum()
}

/// Calculate dot product (inner product) of two vectors
///
/// Returns the sum of element-wise products.
/// Higher values indicate more similar vectors (for normalized vectors).
#[inline]
pub fn dot_product(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum()
}

/// Calculate the magnitude (L2 norm) of a vector
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit length
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}
