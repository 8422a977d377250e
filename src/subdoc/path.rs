use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_PATH_DEPTH;
use crate::subdoc::PathError;

/// A segment in a sub-document path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
    /// Last array element: `[-1]`
    Last,
}

impl PathSegment {
    pub fn is_index(&self) -> bool {
        !matches!(self, PathSegment::Key(_))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            PathSegment::Key(k) if needs_quoting(k) => write!(f, "`{}`", k.replace('`', "``")),
            PathSegment::Key(k) => write!(f, "{k}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
            PathSegment::Last => write!(f, "[-1]"),
        }
    }
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty() || key.chars().any(|c| matches!(c, '.' | '[' | ']' | '`'))
}

/// A path into a JSON document
///
/// | Syntax        | Meaning                          |
/// |---------------|----------------------------------|
/// | (empty)       | document root                    |
/// | `a.b`         | nested object keys               |
/// | `a[2]`        | array element                    |
/// | `a[-1]`       | last array element               |
/// | `` `a.b`.c `` | key containing reserved chars    |
///
/// Parsing is deterministic; the same string always yields the same
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SubdocPath {
    segments: Vec<PathSegment>,
}

impl SubdocPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        path.parse()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn key(
        mut self,
        key: impl Into<String>,
    ) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(
        mut self,
        idx: usize,
    ) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }
}

impl FromStr for SubdocPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;
        // a key may only start at the beginning or right after a '.'
        let mut expect_key = true;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if expect_key {
                        return Err(PathError::Invalid(format!("empty key at position {i}")));
                    }
                    expect_key = true;
                    i += 1;
                    if i >= chars.len() {
                        return Err(PathError::Invalid("path ends with '.'".into()));
                    }
                }
                '[' => {
                    if expect_key && !(segments.is_empty() && i == 0) {
                        return Err(PathError::Invalid(format!("unexpected '[' at position {i}")));
                    }
                    let start = i;
                    i += 1;
                    let idx_start = i;
                    while i < chars.len() && chars[i] != ']' {
                        i += 1;
                    }
                    if i >= chars.len() {
                        return Err(PathError::Invalid(format!(
                            "unclosed bracket starting at position {start}"
                        )));
                    }
                    let idx: String = chars[idx_start..i].iter().collect();
                    segments.push(parse_index(&idx, idx_start)?);
                    expect_key = false;
                    i += 1;
                }
                '`' => {
                    if !expect_key {
                        return Err(PathError::Invalid(format!("unexpected '`' at position {i}")));
                    }
                    let (key, next) = parse_quoted_key(&chars, i)?;
                    segments.push(PathSegment::Key(key));
                    expect_key = false;
                    i = next;
                }
                ']' => {
                    return Err(PathError::Invalid(format!("unexpected ']' at position {i}")));
                }
                _ => {
                    if !expect_key {
                        return Err(PathError::Invalid(format!(
                            "unexpected character '{}' at position {i}",
                            chars[i]
                        )));
                    }
                    let key_start = i;
                    while i < chars.len() && !matches!(chars[i], '.' | '[' | ']' | '`') {
                        i += 1;
                    }
                    segments.push(PathSegment::Key(chars[key_start..i].iter().collect()));
                    expect_key = false;
                }
            }

            if segments.len() > MAX_PATH_DEPTH {
                return Err(PathError::Invalid(format!(
                    "path deeper than {MAX_PATH_DEPTH} segments"
                )));
            }
        }

        Ok(SubdocPath { segments })
    }
}

fn parse_index(
    raw: &str,
    position: usize,
) -> Result<PathSegment, PathError> {
    if raw == "-1" {
        return Ok(PathSegment::Last);
    }
    raw.parse::<usize>()
        .map(PathSegment::Index)
        .map_err(|_| PathError::Invalid(format!("invalid array index '{raw}' at position {position}")))
}

/// Parses a backtick-quoted key starting at `start`; a doubled backtick is a
/// literal backtick. Returns the key and the position after the closing quote.
fn parse_quoted_key(
    chars: &[char],
    start: usize,
) -> Result<(String, usize), PathError> {
    let mut key = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => {
                return Err(PathError::Invalid(format!(
                    "unclosed quote starting at position {start}"
                )))
            }
            Some('`') if chars.get(i + 1) == Some(&'`') => {
                key.push('`');
                i += 2;
            }
            Some('`') => return Ok((key, i + 1)),
            Some(c) => {
                key.push(*c);
                i += 1;
            }
        }
    }
}

impl fmt::Display for SubdocPath {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && !segment.is_index() {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
