use std::sync::Arc;

use super::pdf::{LopdfReader, PdfReader};
use super::{DocumentError, UploadedDocument};

/// Turns uploaded PDFs into one corpus string.
///
/// Page texts are appended in document order, then page order, with nothing
/// inserted between them.
#[derive(Clone)]
pub struct TextExtractor {
    reader: Arc<dyn PdfReader>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(Arc::new(LopdfReader))
    }
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor").finish_non_exhaustive()
    }
}

impl TextExtractor {
    #[must_use]
    pub fn new(reader: Arc<dyn PdfReader>) -> Self {
        Self { reader }
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] for the first document that cannot be
    /// read; no partial corpus is returned.
    pub fn extract(&self, documents: &[UploadedDocument]) -> Result<String, DocumentError> {
        let mut corpus = String::new();
        for (index, document) in documents.iter().enumerate() {
            let pages =
                self.reader
                    .read_pages(&document.bytes)
                    .map_err(|e| DocumentError::Parse {
                        index,
                        name: document.name.clone(),
                        reason: e.to_string(),
                    })?;
            tracing::debug!(
                document = %document.name,
                pages = pages.len(),
                "extracted document text"
            );
            for page in pages {
                corpus.push_str(&page);
            }
        }
        Ok(corpus)
    }
}
