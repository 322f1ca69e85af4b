//! Byte offset to line/column mapping.

use memchr::memchr_iter;

/// Line start table for one source, built once per read.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first byte of each line (line 1 starts at 0)
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(input: &[u8]) -> Self {
        let mut line_starts = Vec::with_capacity(input.len() / 40 + 1);
        line_starts.push(0);
        line_starts.extend(memchr_iter(b'\n', input).map(|nl| nl + 1));
        LineIndex { line_starts }
    }

    /// 1-based (line, column) of a byte offset. Column counts bytes.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert - 1,
        };
        let column = offset - self.line_starts[line];
        (saturate(line + 1), saturate(column + 1))
    }
}

#[inline]
fn saturate(n: usize) -> u32 {
    n.min(u32::MAX as usize) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let index = LineIndex::new(b"<a>\n  <b/>\n</a>");
        assert_eq!(index.position(0), (1, 1));
        assert_eq!(index.position(2), (1, 3));
    }

    #[test]
    fn test_later_lines() {
        let index = LineIndex::new(b"<a>\n  <b/>\n</a>");
        // '<' of <b/>
        assert_eq!(index.position(6), (2, 3));
        // line 3 starts right after the second newline
        assert_eq!(index.position(11), (3, 1));
    }

    #[test]
    fn test_offset_at_newline() {
        let index = LineIndex::new(b"ab\ncd");
        assert_eq!(index.position(2), (1, 3));
        assert_eq!(index.position(3), (2, 1));
    }
}
