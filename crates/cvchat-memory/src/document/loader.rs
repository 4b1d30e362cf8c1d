use std::path::Path;

use super::{DocumentError, UploadedDocument};

impl UploadedDocument {
    /// Read a file from disk, named after its final path component.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or exceeds `max_file_size`.
    pub async fn load(path: &Path, max_file_size: u64) -> Result<Self, DocumentError> {
        let path = tokio::fs::canonicalize(path).await?;

        let meta = tokio::fs::metadata(&path).await?;
        if meta.len() > max_file_size {
            return Err(DocumentError::FileTooLarge(meta.len()));
        }

        let bytes = tokio::fs::read(&path).await?;
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        tracing::debug!(file = %path.display(), size = bytes.len(), "loaded upload");
        Ok(Self { name, bytes })
    }
}
