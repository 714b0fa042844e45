// Reference-link-definition store and stripper, adapted from
// `grammar::blocks::cm_link_reference::link_reference_definition` to
// operate on an already-accumulated paragraph buffer and report how many
// leading bytes it consumed, rather than owning a `nom_locate::Span` over
// the whole document.

use std::collections::HashMap;

use nom::{
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, line_ending, space0, space1},
    combinator::opt,
    IResult, Parser,
};

#[derive(Debug, Clone)]
pub struct LinkReference {
    pub url: String,
    pub title: Option<String>,
}

/// Keyed store of link reference definitions, populated by the block
/// phase and consulted by the inline phase (§GLOSSARY "Refmap").
#[derive(Debug, Default)]
pub struct RefMap {
    entries: HashMap<String, LinkReference>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, reference: LinkReference) {
        let key = normalize_label(label);
        // First definition of a given label wins, per CommonMark.
        self.entries.entry(key).or_insert(reference);
    }

    pub fn get(&self, label: &str) -> Option<&LinkReference> {
        self.entries.get(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Attempt to parse one `[label]: dest "title"` definition from the front
/// of `text`. Returns `(label, reference, bytes_consumed)` on success.
pub fn parse_one(text: &str) -> Option<(String, LinkReference, usize)> {
    let input = text;
    let (input, _) = char::<_, nom::error::Error<&str>>('[').parse(input).ok()?;
    let (input, label) =
        take_till::<_, _, nom::error::Error<&str>>(|c| c == ']' || c == '\n')(input).ok()?;
    if label.is_empty() {
        return None;
    }
    let (input, _) = char::<_, nom::error::Error<&str>>(']').parse(input).ok()?;
    let (input, _) = char::<_, nom::error::Error<&str>>(':').parse(input).ok()?;
    let (input, _) = space0::<_, nom::error::Error<&str>>(input).ok()?;
    let (input, _) =
        opt((line_ending, take_while(|c| c == ' '))).parse(input).ok()?;

    let (input, url) = parse_destination(input)?;

    let (input, title) = parse_optional_title(input);

    let (input, _) = space0::<_, nom::error::Error<&str>>(input).ok()?;
    let (remaining, _) = if input.is_empty() {
        (input, ())
    } else {
        line_ending::<_, nom::error::Error<&str>>(input).ok().map(|(i, _)| (i, ()))?
    };

    let consumed = text.len() - remaining.len();
    Some((
        label.to_string(),
        LinkReference { url, title },
        consumed,
    ))
}

fn parse_destination(input: &str) -> Option<(&str, String)> {
    if let Some(rest) = input.strip_prefix('<') {
        let (url, rest) =
            take_till::<_, _, nom::error::Error<&str>>(|c| c == '>' || c == '\n')(rest).ok()?;
        let rest = rest.strip_prefix('>')?;
        Some((rest, url.to_string()))
    } else {
        let (rest, url) =
            take_while1::<_, _, nom::error::Error<&str>>(|c: char| !c.is_whitespace())(input)
                .ok()?;
        Some((rest, url.to_string()))
    }
}

fn parse_optional_title(input: &str) -> (&str, Option<String>) {
    let try_title = || -> Option<(&str, String)> {
        let (i, _) = space1::<_, nom::error::Error<&str>>(input).ok()?;
        let (i, _) = opt((line_ending, take_while(|c| c == ' '))).parse(i).ok()?;
        let (delim, close) = match i.chars().next()? {
            '"' => ('"', '"'),
            '\'' => ('\'', '\''),
            '(' => ('(', ')'),
            _ => return None,
        };
        let i = &i[delim.len_utf8()..];
        let (title, i) = i.split_once(close)?;
        Some((i, title.to_string()))
    };
    match try_title() {
        Some((rest, title)) => (rest, Some(title)),
        None => (input, None),
    }
}
