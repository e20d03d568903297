/// Splits text into overlapping windows of `chunk_size` chars, with
/// consecutive chunks sharing exactly `overlap` characters (spec.md §4.5).
/// `text-splitter`'s semantic splitting doesn't give control over exact
/// overlap length, so the windows here are cut by char count directly.
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        assert!(overlap < chunk_size, "overlap must be smaller than chunk_size");
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Empty input yields zero chunks. Input shorter than `chunk_size`
    /// yields exactly one chunk. Chunks never split mid multi-byte
    /// character because the window is taken over `chars()`, not bytes.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let stride = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += stride;
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
