use cvchat_llm::{EmbeddingProvider, LlmError};

use crate::document::Chunk;

/// Chunks sent to the embedding backend per request.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding provider error: {0}")]
    Embedding(#[from] LlmError),

    #[error("embedding provider returned {got} vectors for {expected} chunks")]
    CountMismatch { expected: usize, got: usize },

    #[error("empty embedding for chunk {chunk_index}")]
    EmptyEmbedding { chunk_index: usize },

    #[error("embedding for chunk {chunk_index} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        chunk_index: usize,
        expected: usize,
        got: usize,
    },

    #[error("query embedding has dimension {got}, index expects {expected}")]
    QueryDimension { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Exact nearest-neighbour index over chunk embeddings.
///
/// Built wholesale from a chunk sequence; there is no incremental insert.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    dimension: Option<usize>,
}

impl VectorIndex {
    /// Embed every chunk and build the index.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding request fails or the returned vectors
    /// are malformed. No index is produced in that case.
    pub async fn build<E: EmbeddingProvider>(
        chunks: Vec<Chunk>,
        embedder: &E,
    ) -> Result<Self, IndexError> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(IndexError::CountMismatch {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }
            embeddings.extend(vectors);
        }

        let index = Self::from_embeddings(chunks, embeddings)?;
        tracing::debug!(
            chunks = index.len(),
            dimension = index.dimension.unwrap_or(0),
            "vector index built"
        );
        Ok(index)
    }

    /// Assemble an index from precomputed embeddings, one per chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the counts differ, a vector is empty, or vectors
    /// disagree on dimension.
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::CountMismatch {
                expected: chunks.len(),
                got: embeddings.len(),
            });
        }

        let mut dimension = None;
        for (chunk, vector) in chunks.iter().zip(&embeddings) {
            if vector.is_empty() {
                return Err(IndexError::EmptyEmbedding {
                    chunk_index: chunk.chunk_index,
                });
            }
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(IndexError::DimensionMismatch {
                        chunk_index: chunk.chunk_index,
                        expected,
                        got: vector.len(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            entries: chunks.into_iter().zip(embeddings).collect(),
            dimension,
        })
    }

    /// Top `k` chunks by cosine similarity, best first.
    ///
    /// Equal scores are ordered by ascending chunk index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query dimension differs from the index dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk<'_>>, IndexError> {
        let Some(expected) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != expected {
            return Err(IndexError::QueryDimension {
                expected,
                got: query.len(),
            });
        }

        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk,
                score: cosine_similarity(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(k);
        Ok(scored)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|(chunk, _)| chunk)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_nan() { 0.0 } else { score }
}
