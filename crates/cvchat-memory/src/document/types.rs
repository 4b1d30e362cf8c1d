/// Raw content of one uploaded file, consumed by text extraction.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A window of the corpus text.
///
/// `start` and `overlap` are measured in chars. `overlap` is the number of
/// leading chars shared with the previous chunk (0 for the first chunk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub chunk_index: usize,
    pub start: usize,
    pub overlap: usize,
}

impl Chunk {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}
