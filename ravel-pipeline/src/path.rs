//! JSON paths and path patterns.
//!
//! A [`JsonPath`] locates a value inside a document as a list of object keys
//! and array indexes. Paths render as dot-separated segments where every
//! array index is written `[]`, e.g. `Results.[].@metadata`.
//!
//! A [`PathPattern`] selects paths, either as a glob over segments or as a
//! regular expression over the rendered path.

use std::fmt;

use regex::Regex;

use crate::tokenizer::Token;

/// One step of a [`JsonPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// An object member.
    Key(String),
    /// An array element.
    Index(usize),
}

/// Location of a value inside a JSON document. The root is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPath(Vec<Segment>);

impl JsonPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments, outermost first.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// The name of the member this path points at, if it points at one.
    pub fn last_key(&self) -> Option<&str> {
        match self.0.last() {
            Some(Segment::Key(key)) => Some(key),
            _ => None,
        }
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    pub(crate) fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.0)
    }
}

fn write_segments(out: &mut impl fmt::Write, segments: &[Segment]) -> fmt::Result {
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.write_str(".")?;
        }
        match segment {
            Segment::Key(key) => out.write_str(key)?,
            Segment::Index(_) => out.write_str("[]")?,
        }
    }
    Ok(())
}

impl<S: Into<String>> FromIterator<S> for JsonPath {
    /// Builds a path of keys; `[]` items become index 0.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        JsonPath(
            iter.into_iter()
                .map(|s| {
                    let s = s.into();
                    if s == "[]" {
                        Segment::Index(0)
                    } else {
                        Segment::Key(s)
                    }
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobSegment {
    Key(String),
    AnyKey,
    AnyIndex,
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(Vec<GlobSegment>),
    Regex(Regex),
}

/// Selects JSON paths.
///
/// Globs are dot-separated: a literal segment matches that key, `*` matches
/// any key and `[]` matches any array index. A glob matches paths of exactly
/// its length; the empty glob matches the root.
///
/// ```
/// use ravel_pipeline::{JsonPath, PathPattern};
///
/// let pattern = PathPattern::glob("Results.[]");
/// let path: JsonPath = ["Results", "[]"].into_iter().collect();
/// assert!(pattern.matches(&path));
///
/// let metadata = PathPattern::regex(r"(^|\.)@metadata$").unwrap();
/// let path: JsonPath = ["Results", "[]", "@metadata"].into_iter().collect();
/// assert!(metadata.matches(&path));
/// ```
#[derive(Debug, Clone)]
pub struct PathPattern {
    matcher: Matcher,
}

impl PathPattern {
    /// A glob over path segments.
    pub fn glob(pattern: &str) -> Self {
        let segments = if pattern.is_empty() {
            Vec::new()
        } else {
            pattern
                .split('.')
                .map(|segment| match segment {
                    "*" => GlobSegment::AnyKey,
                    "[]" => GlobSegment::AnyIndex,
                    key => GlobSegment::Key(key.to_owned()),
                })
                .collect()
        };
        Self {
            matcher: Matcher::Glob(segments),
        }
    }

    /// A regular expression matched against the rendered path.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: Matcher::Regex(Regex::new(pattern)?),
        })
    }

    /// Whether `path` is selected.
    pub fn matches(&self, path: &JsonPath) -> bool {
        self.matches_segments(path.segments())
    }

    pub(crate) fn matches_segments(&self, segments: &[Segment]) -> bool {
        match &self.matcher {
            Matcher::Glob(globs) => {
                globs.len() == segments.len()
                    && globs
                        .iter()
                        .zip(segments)
                        .all(|(glob, segment)| match (glob, segment) {
                            (GlobSegment::Key(expected), Segment::Key(key)) => expected == key,
                            (GlobSegment::AnyKey, Segment::Key(_)) => true,
                            (GlobSegment::AnyIndex, Segment::Index(_)) => true,
                            _ => false,
                        })
            }
            Matcher::Regex(regex) => {
                let mut rendered = String::new();
                // Writing into a String cannot fail.
                let _ = write_segments(&mut rendered, segments);
                regex.is_match(&rendered)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object,
    Array { next: usize },
}

/// Follows the position of a token stream inside the document.
///
/// Call [`before`](Self::before) ahead of handling a token and
/// [`after`](Self::after) once done; in between, [`path`](Self::path) is the
/// path of the value the token belongs to. For a [`Token::Key`] that is the
/// path of the member being named.
#[derive(Debug, Default)]
pub struct PathTracker {
    path: JsonPath,
    frames: Vec<Frame>,
}

impl PathTracker {
    /// A tracker positioned at the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current path.
    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    /// Current container depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Moves to the position of `token`.
    pub fn before(&mut self, token: &Token) {
        match token {
            Token::Key(key) => self.path.push(Segment::Key(key.clone())),
            token if token.starts_value() => {
                if let Some(Frame::Array { next }) = self.frames.last_mut() {
                    self.path.push(Segment::Index(*next));
                    *next += 1;
                }
            }
            _ => {}
        }
    }

    /// Moves past `token`.
    pub fn after(&mut self, token: &Token) {
        match token {
            Token::Key(_) => {}
            Token::StartObject => self.frames.push(Frame::Object),
            Token::StartArray => self.frames.push(Frame::Array { next: 0 }),
            Token::EndObject | Token::EndArray => {
                self.frames.pop();
                self.leave_value();
            }
            _ => self.leave_value(),
        }
    }

    fn leave_value(&mut self) {
        if !self.frames.is_empty() {
            self.path.pop();
        }
    }
}
