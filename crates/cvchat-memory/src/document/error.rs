#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("failed to parse document #{index} ({name}): {reason}")]
    Parse {
        index: usize,
        name: String,
        reason: String,
    },
}
