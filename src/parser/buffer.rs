//! Append-only accumulator for streamed model text.

/// Accumulates streamed text until it can be attributed to a directive block.
///
/// Text only leaves the buffer through [`StreamBuffer::consume`], which trims
/// a prefix by index, so a pattern can never re-match text that was already
/// processed.
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    text: String,
}

impl StreamBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a streamed fragment.
    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    /// Remove everything from the start of the buffer up to `end`.
    ///
    /// `end` is clamped to the buffer length and moved back to the nearest
    /// char boundary.
    pub fn consume(&mut self, end: usize) {
        let mut end = end.min(self.text.len());
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        self.text.drain(..end);
    }

    /// Current unconsumed text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length of the unconsumed text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the buffer holds no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Drop all buffered text.
    pub fn clear(&mut self) {
        self.text.clear();
    }
}
