//! Cosine similarity and embedding validation.

use crate::error::{EngineError, Result};

/// Cosine similarity between two equal-length vectors, in [-1, 1].
///
/// Fails with [`EngineError::DimensionMismatch`] when lengths differ. A
/// zero-magnitude (or empty) vector yields the sentinel `0.0` so ranking
/// never divides by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Ok(0.0);
    }
    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Check that an embedding has the provider's dimensionality, only finite
/// components, and a non-zero magnitude.
pub fn validate_embedding(embedding: &[f32], expected_dim: usize) -> Result<()> {
    if embedding.len() != expected_dim {
        return Err(EngineError::DimensionMismatch {
            expected: expected_dim,
            actual: embedding.len(),
        });
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(EngineError::DegenerateVector {
            reason: "non-finite component".to_string(),
        });
    }
    if embedding.iter().all(|x| *x == 0.0) {
        return Err(EngineError::DegenerateVector {
            reason: "zero magnitude".to_string(),
        });
    }
    Ok(())
}
