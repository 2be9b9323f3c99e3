//! Scanner for `$[[id]]` placeholder tokens.

const OPEN: &str = "$[[";
const CLOSE: &str = "]]";

/// A piece of a scanned string scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Parameter id taken verbatim from between the delimiters.
    Token(&'a str),
}

/// Split a string into literal text and tokens, left to right.
///
/// An opening delimiter without a matching close is kept as literal text.
pub fn scan(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        segments.push(Segment::Token(&after_open[..end]));
        rest = &after_open[end + CLOSE.len()..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

/// How a string scalar refers to parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    /// No tokens at all.
    None,
    /// The whole scalar is exactly one token.
    Whole(&'a str),
    /// Tokens mixed with literal text, or several tokens.
    Embedded(Vec<Segment<'a>>),
}

/// Classify a string scalar.
pub fn classify(text: &str) -> Reference<'_> {
    let mut segments = scan(text);
    let has_token = segments.iter().any(|s| matches!(s, Segment::Token(_)));
    if !has_token {
        return Reference::None;
    }
    if segments.len() == 1 {
        if let Some(Segment::Token(id)) = segments.pop() {
            return Reference::Whole(id);
        }
    }
    Reference::Embedded(segments)
}

/// Ids referenced by a string scalar, in order of appearance.
pub fn token_ids(text: &str) -> impl Iterator<Item = &str> {
    scan(text).into_iter().filter_map(|s| match s {
        Segment::Token(id) => Some(id),
        Segment::Literal(_) => None,
    })
}
