use super::{Chunk, DocumentError, TextExtractor, TextSplitter, UploadedDocument};

/// Extraction and chunking stages of document processing.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    extractor: TextExtractor,
    splitter: TextSplitter,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(extractor: TextExtractor, splitter: TextSplitter) -> Self {
        Self {
            extractor,
            splitter,
        }
    }

    /// Extract corpus text on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the extractor's error, or an IO error if the blocking task panicked.
    pub async fn extract(&self, documents: Vec<UploadedDocument>) -> Result<String, DocumentError> {
        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&documents))
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))?
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.splitter.split(text)
    }

    /// Extract then split.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction fails.
    pub async fn chunk_documents(
        &self,
        documents: Vec<UploadedDocument>,
    ) -> Result<Vec<Chunk>, DocumentError> {
        let count = documents.len();
        let corpus = self.extract(documents).await?;
        let chunks = self.split(&corpus);
        tracing::info!(
            documents = count,
            chars = corpus.chars().count(),
            chunks = chunks.len(),
            "documents chunked"
        );
        Ok(chunks)
    }
}
