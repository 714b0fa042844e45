// Line preparer: tab expansion (§4.2). Tab stops are relative to the start
// of the line and land on the next multiple of 4.

/// Expand tabs to spaces (tab stop = 4) and guarantee a single trailing
/// `\n`. `raw` must not itself contain a `\n` (the line buffer already
/// split on it).
pub fn prepare_line(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 1);
    let mut column = 0usize;
    for &b in raw {
        if b == b'\t' {
            let width = 4 - (column % 4);
            out.extend(std::iter::repeat(b' ').take(width));
            column += width;
        } else {
            out.push(b);
            column += 1;
        }
    }
    out.push(b'\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_test_tab_expands_to_next_stop() {
        assert_eq!(prepare_line(b"\ttext"), b"    text\n");
        assert_eq!(prepare_line(b" \ttext"), b"    text\n");
        assert_eq!(prepare_line(b"  \ttext"), b"    text\n");
    }

    #[test]
    fn smoke_test_no_tabs_just_adds_newline() {
        assert_eq!(prepare_line(b"plain"), b"plain\n");
    }

    #[test]
    fn smoke_test_tab_after_text_uses_running_column() {
        assert_eq!(prepare_line(b"ab\tc"), b"ab  c\n");
    }
}
