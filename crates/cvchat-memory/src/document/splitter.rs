use super::types::Chunk;

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Preferred split point; chunks end right after it when possible.
    pub separator: String,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: "\n".to_owned(),
        }
    }
}

/// Splits corpus text into overlapping windows measured in chars.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// Size 0 is raised to 1 and overlap is clamped below size.
    #[must_use]
    pub fn new(mut config: SplitterConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        config.chunk_overlap = config.chunk_overlap.min(config.chunk_size - 1);
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        if len == 0 {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let boundaries = separator_boundaries(&chars, &self.config.separator);

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut shared = 0;

        loop {
            let end = if len - start <= size {
                len
            } else {
                // Must end past the previous chunk and leave room for the next one's overlap.
                let floor = start + shared.max(overlap);
                last_boundary_in(&boundaries, floor, start + size).unwrap_or(start + size)
            };

            chunks.push(Chunk {
                content: chars[start..end].iter().collect(),
                chunk_index: chunks.len(),
                start,
                overlap: shared,
            });

            if end == len {
                break;
            }

            let latest = end - overlap;
            let earliest = (start + 1)
                .max(end.saturating_sub(2 * overlap))
                .max((end + 1).saturating_sub(size));
            let next = last_boundary_in(&boundaries, earliest.saturating_sub(1), latest)
                .unwrap_or(latest);

            shared = end - next;
            start = next;
        }

        chunks
    }
}

/// Rebuild the source text by dropping each chunk's overlapping prefix.
#[must_use]
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    for chunk in chunks {
        text.extend(chunk.content.chars().skip(chunk.overlap));
    }
    text
}

/// Char positions directly after each occurrence of `separator`.
fn separator_boundaries(chars: &[char], separator: &str) -> Vec<usize> {
    let sep: Vec<char> = separator.chars().collect();
    if sep.is_empty() || sep.len() > chars.len() {
        return Vec::new();
    }
    chars
        .windows(sep.len())
        .enumerate()
        .filter(|(_, window)| *window == sep.as_slice())
        .map(|(i, _)| i + sep.len())
        .collect()
}

/// Largest boundary `b` with `after < b <= upto`.
fn last_boundary_in(boundaries: &[usize], after: usize, upto: usize) -> Option<usize> {
    let idx = boundaries.partition_point(|&b| b <= upto);
    idx.checked_sub(1)
        .map(|i| boundaries[i])
        .filter(|&b| b > after)
}
