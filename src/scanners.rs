// Pure per-line scanners consulted by the opener (§4.4). Each operates on
// a single already-indentation-stripped line and reports only whether/how
// a construct opens on it; the driver in `parser.rs` owns all
// cross-line state (continuation, lazy paragraphs, fence tracking).

use nom::{
    bytes::complete::{tag, take_while},
    character::complete::{digit1, one_of},
    combinator::recognize,
    multi::many1_count,
    Parser,
};
use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

/// ATX heading: 1-6 `#` followed by space/tab/EOL, or EOL itself.
/// Returns `(level, rest_of_line_after_separator)`.
pub fn atx_heading(line: &str) -> Option<(u8, &str)> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let input = Span::new(line);
    let (input, hashes) = recognize(many1_count(tag("#"))).parse(input).ok()?;
    let level = hashes.fragment().len();
    if level > 6 {
        return None;
    }
    let rest = *input.fragment();
    match rest.chars().next() {
        None => Some((level as u8, "")),
        Some(' ') | Some('\t') => Some((level as u8, rest.trim_start_matches([' ', '\t']))),
        _ => None,
    }
}

/// Fenced code opening: ``` ``` ``` or `~~~` (length >= 3), optional info
/// string. Returns `(fence_char, fence_length, info)`.
pub fn fence_open(line: &str) -> Option<(u8, usize, String)> {
    let input = Span::new(line);
    let (input, fence_char) = one_of::<_, _, nom::error::Error<Span>>("`~")(input).ok()?;
    let (input, rest_fence) =
        take_while::<_, _, nom::error::Error<Span>>(|c| c == fence_char)(input).ok()?;
    let fence_length = 1 + rest_fence.fragment().len();
    if fence_length < 3 {
        return None;
    }
    let info = input.fragment().trim().to_string();
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    Some((fence_char as u8, fence_length, info))
}

/// Fenced code closing: up to 3 leading spaces (already stripped by
/// caller), fence char repeated >= `fence_length` times, then only
/// whitespace to EOL.
pub fn fence_close(line: &str, fence_char: u8, fence_length: usize) -> bool {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let ch = fence_char as char;
    let count = line.chars().take_while(|&c| c == ch).count();
    count >= fence_length && line[count..].chars().all(|c| c == ' ' || c == '\t')
}

/// Thematic break: `***`, `---`, or `___`, at least 3 chars, interior
/// spaces/tabs allowed, nothing else on the line.
pub fn thematic_break(line: &str) -> bool {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut chars = line.chars().filter(|&c| c != ' ' && c != '\t');
    let first = match chars.next() {
        Some(c) if c == '-' || c == '*' || c == '_' => c,
        _ => return false,
    };
    let mut count = 1;
    for c in chars {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

/// Setext underline: a solid run of `=` (level 1) or `-` (level 2), with
/// only trailing spaces/tabs permitted.
pub fn setext_underline(line: &str) -> Option<u8> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let first = line.chars().next()?;
    let level = match first {
        '=' => 1,
        '-' => 2,
        _ => return None,
    };
    let rest = line.trim_start_matches(first);
    if !rest.chars().all(|c| c == ' ' || c == '\t') {
        return None;
    }
    Some(level)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Bullet(u8),
    Ordered { start: u32, delimiter: u8 },
}

/// `parse_list_marker`: recognizes `*`/`-`/`+` or a 1-9 digit number
/// followed by `.`/`)`, then a space (or EOL, for an empty first line).
/// Returns `(marker, matched_width)` where `matched_width` is the number
/// of bytes consumed by the marker itself (not including trailing
/// spaces).
pub fn list_marker(line: &str) -> Option<(MarkerKind, usize)> {
    let input = Span::new(line);
    if let Ok((after, digits)) = digit1::<Span, nom::error::Error<Span>>(input) {
        let text = *digits.fragment();
        if text.len() > 9 {
            return None;
        }
        let number: u32 = text.parse().ok()?;
        let (after_delim, delim) =
            one_of::<_, _, nom::error::Error<Span>>(".)")(after).ok()?;
        if separator_ok(after_delim.fragment()) {
            return Some((
                MarkerKind::Ordered {
                    start: number,
                    delimiter: delim as u8,
                },
                text.len() + 1,
            ));
        }
        return None;
    }
    if let Ok((after, bullet)) = one_of::<_, _, nom::error::Error<Span>>("-+*")(input) {
        if separator_ok(after.fragment()) {
            return Some((MarkerKind::Bullet(bullet as u8), 1));
        }
    }
    None
}

fn separator_ok(after: &str) -> bool {
    matches!(after.chars().next(), None | Some(' ') | Some('\t') | Some('\n'))
}

/// Number of spaces after the marker, capped at 5, for the padding
/// calculation in §4.4 rule 8.
pub fn spaces_after_marker(rest: &str) -> usize {
    rest.chars().take_while(|&c| c == ' ').take(5).count()
}

/// Recognized HTML block start conditions (a reduced set of
/// CommonMark's 7 types, sufficient for this dialect where, per §4.3,
/// Html blocks simply "continue iff not blank"): comments, processing
/// instructions, declarations, CDATA, and any line opening with `<tag`
/// or `</tag`.
pub fn html_block_start(line: &str) -> bool {
    let t = line.trim_start();
    if !t.starts_with('<') {
        return false;
    }
    t.starts_with("<!--")
        || t.starts_with("<?")
        || t.starts_with("<![CDATA[")
        || t.starts_with("<!")
        || {
            let after_bracket = &t[1..];
            let tag_body = after_bracket.strip_prefix('/').unwrap_or(after_bracket);
            tag_body
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
        }
}
