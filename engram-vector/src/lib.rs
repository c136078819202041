//! # engram-vector
//!
//! Dense vector primitives shared by the embedders, the stores, and the
//! retrieval scorer: dot/cosine/normalize/compress/fuse, the little-endian
//! f32 wire codec, and the 64-bit simhash fingerprint.

pub mod codec;
pub mod ops;
pub mod simhash;

pub use codec::{bytes_to_vec, vec_to_bytes};
pub use ops::{compress, cosine, dot, fuse, mean, norm, normalize, resize};
pub use simhash::{simhash64, simhash_from_hex, simhash_to_hex};
