//! Deterministic hashed-feature embedder.
//!
//! The fallback when no provider is configured (and the whole story at
//! tier fast): tokenises, expands a small synonym table, and hashes
//! unigram/n-gram/skip features into the target dimension with two
//! independent 32-bit hashes. No network, no model files, stable across
//! runs and platforms.

use engram_core::sector::Sector;
use engram_vector::ops::normalize;

/// Feature weights. Unigrams dominate; n-grams and skip patterns add
/// subword and word-order signal.
const W_UNIGRAM: f32 = 1.0;
const W_CHAR3: f32 = 0.40;
const W_CHAR4: f32 = 0.30;
const W_BIGRAM: f32 = 0.70;
const W_TRIGRAM: f32 = 0.50;
const W_SKIP2: f32 = 0.45;

/// Positional signal is only worth carrying for the head of the text.
const POSITIONAL_TOKENS: usize = 50;
const W_POSITIONAL: f32 = 0.05;

/// Fixed synonym expansions applied after stemming. Kept deliberately
/// small: the goal is to pull obvious paraphrases together, not to ship
/// a thesaurus.
const SYNONYMS: &[(&str, &str)] = &[
    ("happy", "joy"),
    ("glad", "joy"),
    ("sad", "sorrow"),
    ("unhappy", "sorrow"),
    ("angry", "anger"),
    ("mad", "anger"),
    ("big", "large"),
    ("huge", "large"),
    ("small", "little"),
    ("tiny", "little"),
    ("fast", "quick"),
    ("rapid", "quick"),
    ("slow", "sluggish"),
    ("smart", "clever"),
    ("intelligent", "clever"),
    ("begin", "start"),
    ("commence", "start"),
    ("end", "finish"),
    ("stop", "finish"),
    ("create", "make"),
    ("build", "make"),
    ("remove", "delete"),
    ("erase", "delete"),
];

/// Per-sector multiplier mixed into the vector so the same text lands in
/// slightly different directions per sector.
fn sector_multiplier(sector: Sector) -> f32 {
    match sector {
        Sector::Episodic => 1.3,
        Sector::Semantic => 1.0,
        Sector::Procedural => 1.2,
        Sector::Emotional => 1.4,
        Sector::Reflective => 0.9,
    }
}

/// The embedder itself. Stateless; construct once and share.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticEmbedder;

impl SyntheticEmbedder {
    pub fn new() -> Self {
        SyntheticEmbedder
    }

    /// Produce a unit-length vector for (text, sector) at `dim`.
    ///
    /// Empty or token-free text returns the uniform unit vector
    /// `(1/√dim, …)`.
    pub fn embed(&self, text: &str, sector: Sector, dim: usize) -> Vec<f32> {
        assert!(dim > 0, "embedding dimension must be positive");

        let tokens = canonical_tokens(text);
        if tokens.is_empty() {
            let x = 1.0 / (dim as f32).sqrt();
            return vec![x; dim];
        }

        let mut v = vec![0.0f32; dim];

        for (pos, token) in tokens.iter().enumerate() {
            add_feature(&mut v, token, W_UNIGRAM);

            // Character n-grams give subword robustness.
            for gram in char_ngrams(token, 3) {
                add_feature(&mut v, &gram, W_CHAR3);
            }
            for gram in char_ngrams(token, 4) {
                add_feature(&mut v, &gram, W_CHAR4);
            }

            // Word-order features.
            if pos + 1 < tokens.len() {
                add_feature(&mut v, &join2(token, &tokens[pos + 1]), W_BIGRAM);
            }
            if pos + 2 < tokens.len() {
                add_feature(
                    &mut v,
                    &format!("{token} {} {}", tokens[pos + 1], tokens[pos + 2]),
                    W_TRIGRAM,
                );
                add_feature(&mut v, &join2(token, &tokens[pos + 2]), W_SKIP2);
            }

            // Positional sinusoid for the head of the text.
            if pos < POSITIONAL_TOKENS {
                let idx = bucket(hash_fnv1a(token.as_bytes()).wrapping_add(pos as u32), dim);
                v[idx] += W_POSITIONAL * ((pos as f32 + 1.0) * 0.35).sin();
            }
        }

        // Mix the sector identity into the direction: every element whose
        // index is congruent to the sector's position gets the sector
        // multiplier. Scaling the whole vector would be erased by the
        // final normalisation.
        let mult = sector_multiplier(sector);
        let lane = sector.index();
        for (i, x) in v.iter_mut().enumerate() {
            if i % 5 == lane {
                *x *= mult;
            }
        }

        normalize(&mut v);
        v
    }
}

/// Add one hashed feature at its two hash positions.
fn add_feature(v: &mut [f32], feature: &str, weight: f32) {
    let dim = v.len();
    let h1 = hash_fnv1a(feature.as_bytes());
    let h2 = hash_djb2(feature.as_bytes());
    v[bucket(h1, dim)] += weight;
    // Second hash contributes half-weight with a parity sign, which keeps
    // collisions from piling up in one direction.
    let sign = if h2 & 1 == 0 { 1.0 } else { -1.0 };
    v[bucket(h2, dim)] += 0.5 * weight * sign;
}

/// Map a 32-bit hash into [0, dim): bitmask when dim is a power of two,
/// modulo otherwise.
fn bucket(h: u32, dim: usize) -> usize {
    if dim.is_power_of_two() {
        (h as usize) & (dim - 1)
    } else {
        (h as usize) % dim
    }
}

/// FNV-1a, 32-bit.
fn hash_fnv1a(bytes: &[u8]) -> u32 {
    let mut h: u32 = 2_166_136_261;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(16_777_619);
    }
    h
}

/// DJB2, 32-bit. Independent enough of FNV for the two-hash trick.
fn hash_djb2(bytes: &[u8]) -> u32 {
    let mut h: u32 = 5_381;
    for &b in bytes {
        h = h.wrapping_mul(33) ^ (b as u32);
    }
    h
}

/// Lowercase, split on non-alphanumerics, light-stem, expand synonyms.
fn canonical_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();
    for raw in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let stemmed = stem_light(raw);
        let canonical = SYNONYMS
            .iter()
            .find(|(from, _)| *from == stemmed)
            .map(|(_, to)| to.to_string())
            .unwrap_or(stemmed);
        out.push(canonical);
    }
    out
}

/// Light suffix stripping. Just enough that "jumping"/"jumped"/"jumps"
/// share a token; real stemming belongs to a provider, not here.
fn stem_light(token: &str) -> String {
    let t = token;
    for suffix in ["ing", "edly", "ed", "ies", "es", "s"] {
        if let Some(base) = t.strip_suffix(suffix) {
            if base.len() >= 3 {
                return base.to_string();
            }
        }
    }
    t.to_string()
}

fn char_ngrams(token: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= n {
        return Vec::new();
    }
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

fn join2(a: &str, b: &str) -> String {
    let mut s = String::with_capacity(a.len() + b.len() + 1);
    s.push_str(a);
    s.push(' ');
    s.push_str(b);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_vector::ops::{cosine, norm};

    #[test]
    fn deterministic() {
        let e = SyntheticEmbedder::new();
        let a = e.embed("hello world", Sector::Semantic, 256);
        let b = e.embed("hello world", Sector::Semantic, 256);
        assert_eq!(a, b);
    }

    #[test]
    fn unit_norm_at_any_dim() {
        let e = SyntheticEmbedder::new();
        for dim in [7, 64, 100, 256] {
            let v = e.embed("the quick brown fox", Sector::Episodic, dim);
            assert_eq!(v.len(), dim);
            assert!((norm(&v) - 1.0).abs() < 1e-3, "dim {dim}");
        }
    }

    #[test]
    fn empty_text_is_uniform() {
        let e = SyntheticEmbedder::new();
        let v = e.embed("", Sector::Semantic, 16);
        let expected = 1.0 / 4.0;
        assert!(v.iter().all(|x| (*x - expected).abs() < 1e-6));
    }

    #[test]
    fn sectors_produce_distinct_vectors() {
        let e = SyntheticEmbedder::new();
        let sem = e.embed("walking in the park", Sector::Semantic, 128);
        let emo = e.embed("walking in the park", Sector::Emotional, 128);
        assert_ne!(sem, emo);
        // Same text should still be close across sectors.
        assert!(cosine(&sem, &emo).unwrap() > 0.8);
    }

    #[test]
    fn similar_texts_are_closer_than_unrelated() {
        let e = SyntheticEmbedder::new();
        let a = e.embed("the cat sat on the mat", Sector::Semantic, 256);
        let b = e.embed("a cat sitting on a mat", Sector::Semantic, 256);
        let c = e.embed("postgres connection pool tuning", Sector::Semantic, 256);
        let sim_ab = cosine(&a, &b).unwrap();
        let sim_ac = cosine(&a, &c).unwrap();
        assert!(sim_ab > sim_ac, "ab={sim_ab} ac={sim_ac}");
    }

    #[test]
    fn synonyms_pull_texts_together() {
        let e = SyntheticEmbedder::new();
        let a = e.embed("a happy dog", Sector::Emotional, 256);
        let b = e.embed("a glad dog", Sector::Emotional, 256);
        let c = e.embed("a wooden door", Sector::Emotional, 256);
        assert!(cosine(&a, &b).unwrap() > cosine(&a, &c).unwrap());
    }

    #[test]
    fn stemming_merges_inflections() {
        assert_eq!(stem_light("jumping"), "jump");
        assert_eq!(stem_light("jumped"), "jump");
        assert_eq!(stem_light("jumps"), "jump");
        // Too-short bases are left alone.
        assert_eq!(stem_light("is"), "is");
    }
}
