/// Big-endian byte reads and append-only writes
pub mod cursor;
/// Memory-mapped archive sources
#[cfg(feature = "mmap")]
pub mod wrappers;

/// A half-open `start..end` byte range within an archive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
