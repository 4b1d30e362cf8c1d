pub mod error;
pub mod extractor;
pub mod loader;
pub mod pdf;
pub mod pipeline;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use extractor::TextExtractor;
pub use pdf::{LopdfReader, PdfReadError, PdfReader};
pub use pipeline::IngestionPipeline;
pub use splitter::{SplitterConfig, TextSplitter, reassemble};
pub use types::{Chunk, UploadedDocument};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
