//! Embedding pipeline: image set in, embedded set out.
//!
//! Stages per image: validate, decode (blocking pool, with timeout),
//! preprocess, then batched encoding on the blocking pool.

mod embedder;

pub use embedder::{BatchEncoder, ImageEmbedder};
