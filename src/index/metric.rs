use crate::core::types::Metric;

/// Computes a similarity score between `query` and `stored` under the given
/// metric. Oriented so that larger is always better: cosine similarity in
/// `[-1, 1]`, the raw dot product, or the negated euclidean distance (`0.0`
/// is a perfect match, everything else negative).
///
/// Both slices are assumed to already have matching, validated length —
/// callers (the indexes) are responsible for dimension checks.
pub fn score(metric: Metric, query: &[f32], stored: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(query, stored),
        Metric::Euclidean => -euclidean_distance(query, stored),
        Metric::DotProduct => dot(query, stored),
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum.sqrt()
}

/// Cosine similarity. A zero-norm vector has no direction; by convention it
/// is treated as orthogonal to everything (similarity 0.0) rather than
/// producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let numerator = dot(a, b);
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    numerator / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn euclidean_of_identical_vectors_is_zero() {
        let v = [3.0, 4.0];
        assert_eq!(-euclidean_distance(&v, &v), 0.0);
    }

    #[test]
    fn euclidean_sign_convention_matches_known_distance() {
        let origin = [0.0, 0.0];
        let point = [3.0, 4.0];
        assert_eq!(score(Metric::Euclidean, &origin, &point), -5.0);
    }

    #[test]
    fn zero_vector_cosine_is_defined_as_zero() {
        let zero = [0.0, 0.0];
        let v = [1.0, 1.0];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
    }
}
