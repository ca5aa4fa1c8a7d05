//! Vector math primitives.
//!
//! Pure functions over equal-length f32 slices. Length mismatch is a
//! precondition violation and fails with `DimensionMismatch` rather than
//! truncating. A zero-norm vector yields cosine similarity 0.0 so it can
//! never poison downstream ranking with NaN.

use crate::error::IndexError;

fn check_dims(a: &[f32], b: &[f32]) -> Result<(), IndexError> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Dot product of two equal-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32, IndexError> {
    check_dims(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Cosine similarity in [-1, 1]. Returns 0.0 if either vector has zero
/// norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, IndexError> {
    check_dims(a, b)?;
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// Euclidean (L2) distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32, IndexError> {
    check_dims(a, b)?;
    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(dot_product(&a, &b).unwrap(), 32.0);
    }

    #[test]
    fn test_cosine_identical() {
        let a = [0.5, 0.5, 0.5];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&b, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((euclidean_distance(&a, &b).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        for result in [
            dot_product(&a, &b),
            cosine_similarity(&a, &b),
            euclidean_distance(&a, &b),
        ] {
            assert!(matches!(
                result,
                Err(IndexError::DimensionMismatch {
                    expected: 2,
                    actual: 3
                })
            ));
        }
    }
}
