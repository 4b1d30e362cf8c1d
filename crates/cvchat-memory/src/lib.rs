//! Document extraction, chunking and vector index for cvchat.

pub mod document;
pub mod index;

pub use index::{IndexError, ScoredChunk, VectorIndex};
