// Line buffer: joins incoming byte chunks at newline boundaries.
//
// Mirrors the teacher's `skip_indentation`-style preference for returning
// owned/borrowed slices rather than re-scanning; here the buffer owns its
// residual bytes across `feed` calls since a line may straddle chunks.

/// Accumulates chunked input and yields whole logical lines, each without
/// its trailing `\n` (the preparer re-attaches a synthesized one).
#[derive(Debug, Default)]
pub struct LineBuffer {
    residual: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, emitting every complete line it concludes (the
    /// residual, if the chunk does not end mid-line, counts too).
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut start = 0;
        let combined: Vec<u8>;
        let data: &[u8] = if self.residual.is_empty() {
            bytes
        } else {
            combined = std::mem::take(&mut self.residual)
                .into_iter()
                .chain(bytes.iter().copied())
                .collect();
            &combined
        };

        for (i, &b) in data.iter().enumerate() {
            if b == b'\n' {
                lines.push(data[start..i].to_vec());
                start = i + 1;
            }
        }
        self.residual = data[start..].to_vec();
        lines
    }

    /// Drain any residual bytes as a final line (even without a trailing
    /// `\n`), per §4.1.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.residual.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.residual))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_test_single_chunk_whole_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.feed(b"a\nb\n");
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn smoke_test_line_straddling_two_chunks() {
        let mut buf = LineBuffer::new();
        let first = buf.feed(b"hel");
        assert!(first.is_empty());
        let second = buf.feed(b"lo\nworld\n");
        assert_eq!(second, vec![b"hello".to_vec(), b"world".to_vec()]);
    }

    #[test]
    fn smoke_test_finish_emits_trailing_partial_line() {
        let mut buf = LineBuffer::new();
        buf.feed(b"no newline");
        assert_eq!(buf.finish(), Some(b"no newline".to_vec()));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn smoke_test_byte_by_byte_feed_matches_single_feed() {
        let mut a = LineBuffer::new();
        let mut collected = Vec::new();
        for b in b"abc\n".iter() {
            collected.extend(a.feed(&[*b]));
        }
        let mut b = LineBuffer::new();
        let lines = b.feed(b"abc\n");
        assert_eq!(collected, lines);
        assert_eq!(lines, vec![b"abc".to_vec()]);
    }
}
