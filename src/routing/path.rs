//! Path pattern parsing and joining.
//!
//! # Responsibilities
//! - Split a registered pattern into static and parameter segments
//! - Join controller prefixes with route suffixes
//!
//! # Design Decisions
//! - A segment starting with `:` is always a parameter
//! - Empty segments are ignored, so `/a//b/` and `/a/b` are the same route
//! - Matching is case-sensitive and byte-exact
//! - Captured parameter values are percent-decoded after splitting, so an
//!   encoded `%2F` stays inside its segment

use percent_encoding::percent_decode_str;

use crate::routing::router::RouteError;

/// Marker that starts a parameter segment.
pub const PARAM_MARKER: char = ':';

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
}

impl Segment {
    fn render(&self) -> String {
        match self {
            Segment::Static(s) => s.clone(),
            Segment::Param(name) => format!("{PARAM_MARKER}{name}"),
        }
    }
}

/// Split a request path into its non-empty segments.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Percent-decode one raw path segment. Invalid UTF-8 is replaced lossily.
pub fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Parse a route pattern such as `/users/:id`.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    if !pattern.starts_with('/') {
        return Err(RouteError::InvalidPath(pattern.to_string()));
    }

    let mut segments = Vec::new();
    for raw in split(pattern) {
        match raw.strip_prefix(PARAM_MARKER) {
            Some("") => return Err(RouteError::EmptyParam(pattern.to_string())),
            Some(name) => {
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(n) if n == name))
                {
                    return Err(RouteError::DuplicateParam {
                        path: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                segments.push(Segment::Param(name.to_string()));
            }
            None => segments.push(Segment::Static(raw.to_string())),
        }
    }
    Ok(segments)
}

/// Render parsed segments back into their canonical pattern.
pub fn render(segments: &[Segment]) -> String {
    let parts: Vec<String> = segments.iter().map(Segment::render).collect();
    format!("/{}", parts.join("/"))
}

/// Join a base path and a suffix, normalizing separators.
///
/// `.` segments are dropped and `..` removes the previous segment, so the
/// result is always an absolute, clean path.
pub fn join(base: &str, suffix: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in split(base).chain(split(suffix)) {
        match seg {
            "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}
