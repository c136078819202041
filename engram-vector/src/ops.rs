//! Core dense-vector operations.
//!
//! Vectors are plain `&[f32]` slices. Length mismatches are a caller
//! error and surface as `BadRequest`; nothing here panics on user input.

use engram_core::errors::{EngramError, EngramResult};

/// Dot product. Fails when the lengths differ.
pub fn dot(a: &[f32], b: &[f32]) -> EngramResult<f32> {
    if a.len() != b.len() {
        return Err(EngramError::bad_request(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Cosine similarity. Zero when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> EngramResult<f32> {
    let d = dot(a, b)?;
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    Ok(d / (na * nb))
}

/// L2 norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length in place. A zero vector is left unchanged.
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

/// Shrink to `target_dim` by averaging contiguous buckets, then
/// renormalize. Returns the input unchanged when it is already at or
/// under the target.
pub fn compress(v: &[f32], target_dim: usize) -> Vec<f32> {
    if target_dim == 0 || v.len() <= target_dim {
        return v.to_vec();
    }
    let mut out = vec![0.0f32; target_dim];
    let mut counts = vec![0u32; target_dim];
    // Contiguous buckets: source index i lands in bucket i*td/len.
    for (i, &x) in v.iter().enumerate() {
        let bucket = i * target_dim / v.len();
        out[bucket] += x;
        counts[bucket] += 1;
    }
    for (x, c) in out.iter_mut().zip(counts.iter()) {
        if *c > 0 {
            *x /= *c as f32;
        }
    }
    normalize(&mut out);
    out
}

/// Fuse a synthetic and a semantic vector: `0.6·syn ⧺ 0.4·sem`,
/// normalized. The result length is `|syn| + |sem|`.
pub fn fuse(syn: &[f32], sem: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(syn.len() + sem.len());
    out.extend(syn.iter().map(|x| 0.6 * x));
    out.extend(sem.iter().map(|x| 0.4 * x));
    normalize(&mut out);
    out
}

/// Elementwise mean of equal-length vectors. Empty input yields an empty
/// vector; a length mismatch is a `BadRequest`.
pub fn mean(vectors: &[Vec<f32>]) -> EngramResult<Vec<f32>> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let dim = first.len();
    let mut out = vec![0.0f32; dim];
    for v in vectors {
        if v.len() != dim {
            return Err(EngramError::bad_request(format!(
                "dimension mismatch in mean: {} vs {}",
                v.len(),
                dim
            )));
        }
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += x;
        }
    }
    let n = vectors.len() as f32;
    for o in out.iter_mut() {
        *o /= n;
    }
    Ok(out)
}

/// Resize to `dim`: truncate or right-pad with zeros, then renormalize
/// when anything survived.
pub fn resize(v: &[f32], dim: usize) -> Vec<f32> {
    let mut out = v.to_vec();
    out.resize(dim, 0.0);
    normalize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_rejects_mismatched_lengths() {
        let err = dot(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let c = cosine(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((c - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn compress_short_input_unchanged() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(compress(&v, 8), v);
    }

    #[test]
    fn compress_hits_target_dim_and_unit_norm() {
        let v: Vec<f32> = (0..256).map(|i| i as f32).collect();
        let c = compress(&v, 128);
        assert_eq!(c.len(), 128);
        assert!((norm(&c) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fuse_concatenates_and_normalizes() {
        let f = fuse(&[1.0, 0.0], &[0.0, 1.0, 0.0]);
        assert_eq!(f.len(), 5);
        assert!((norm(&f) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fuse_of_zero_inputs_stays_zero() {
        let f = fuse(&[0.0], &[0.0, 0.0]);
        assert_eq!(f, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn mean_averages_elementwise() {
        let m = mean(&[vec![1.0, 0.0], vec![3.0, 2.0]]).unwrap();
        assert_eq!(m, vec![2.0, 1.0]);
    }

    #[test]
    fn resize_pads_and_truncates() {
        assert_eq!(resize(&[3.0, 4.0], 2).len(), 2);
        let padded = resize(&[3.0, 4.0], 4);
        assert_eq!(padded.len(), 4);
        assert!((norm(&padded) - 1.0).abs() < 1e-6);
        let cut = resize(&[1.0, 1.0, 1.0, 1.0], 2);
        assert_eq!(cut.len(), 2);
    }
}
