//! Binary wire codec for stored vectors.
//!
//! Raw little-endian IEEE-754 float32; length is implicit from the byte
//! length divided by four. This format is shared by both metadata
//! backends and the KV store, so it must stay bit-exact across versions.

use engram_core::errors::{EngramError, EngramResult};

/// Encode an f32 slice as little-endian bytes.
pub fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

/// Decode little-endian bytes back into an f32 vector.
/// A byte length that is not a multiple of four means the row is corrupt.
pub fn bytes_to_vec(bytes: &[u8]) -> EngramResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(EngramError::internal(format!(
            "vector blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut out = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_roundtrip() {
        assert_eq!(bytes_to_vec(&vec_to_bytes(&[])).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn truncated_blob_is_internal_error() {
        let err = bytes_to_vec(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.code(), "internal");
    }

    proptest! {
        /// Round-trips are bit-exact for every float, including NaN
        /// payloads and signed zeros.
        #[test]
        fn roundtrip_bit_exact(v in proptest::collection::vec(any::<f32>(), 0..512)) {
            let back = bytes_to_vec(&vec_to_bytes(&v)).unwrap();
            prop_assert_eq!(back.len(), v.len());
            for (a, b) in v.iter().zip(back.iter()) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
