//! 64-bit similarity-preserving fingerprint for near-duplicate detection.
//!
//! Classic simhash: each token votes its blake3-derived 64-bit digest
//! into per-bit counters; the sign of each counter becomes one output
//! bit. Texts that share most tokens land on nearby fingerprints.

/// Compute the 64-bit simhash of a text.
///
/// Tokenisation is deliberately coarse (lowercased alphanumeric runs):
/// the fingerprint only has to be stable, not linguistically clever.
pub fn simhash64(text: &str) -> u64 {
    let mut counters = [0i32; 64];
    let lower = text.to_lowercase();
    let mut any = false;

    for token in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        any = true;
        let digest = token_digest(token);
        for (bit, counter) in counters.iter_mut().enumerate() {
            if digest & (1u64 << bit) != 0 {
                *counter += 1;
            } else {
                *counter -= 1;
            }
        }
    }

    if !any {
        return 0;
    }

    let mut hash = 0u64;
    for (bit, counter) in counters.iter().enumerate() {
        if *counter > 0 {
            hash |= 1u64 << bit;
        }
    }
    hash
}

/// First eight bytes of the token's blake3 digest as a little-endian u64.
fn token_digest(token: &str) -> u64 {
    let hash = blake3::hash(token.as_bytes());
    let bytes = hash.as_bytes();
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Storage encoding: lowercase hex, fixed 16 chars.
pub fn simhash_to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Parse the storage encoding.
pub fn simhash_from_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s, 16).ok()
}

/// Hamming distance between two fingerprints.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_identical_hash() {
        assert_eq!(simhash64("apples are red"), simhash64("apples are red"));
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        assert_eq!(simhash64("Apples, are RED!"), simhash64("apples are red"));
    }

    #[test]
    fn similar_texts_are_near() {
        let a = simhash64("the quick brown fox jumps over the lazy dog");
        let b = simhash64("the quick brown fox jumps over the lazy cat");
        assert!(hamming(a, b) < 24, "distance was {}", hamming(a, b));
    }

    #[test]
    fn unrelated_texts_are_far() {
        let a = simhash64("the quick brown fox jumps over the lazy dog");
        let b = simhash64("asynchronous postgres connection pooling semantics");
        assert!(hamming(a, b) > 10, "distance was {}", hamming(a, b));
    }

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(simhash64(""), 0);
        assert_eq!(simhash64("   ...   "), 0);
    }

    #[test]
    fn hex_roundtrip() {
        let h = simhash64("roundtrip me");
        assert_eq!(simhash_from_hex(&simhash_to_hex(h)), Some(h));
        assert_eq!(simhash_to_hex(0xabc).len(), 16);
    }
}
