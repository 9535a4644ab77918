use crate::router::params::Params;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a route pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Route pattern is empty.")]
    Empty,

    #[error("Pattern '{pattern}' has unmatched '{{' or '}}'.")]
    UnbalancedBraces { pattern: String },

    #[error("Segment '{segment}' declares a placeholder without a name.")]
    EmptyPlaceholder { segment: String },

    #[error("Segment '{segment}' mixes literal text and a placeholder.")]
    MixedSegment { segment: String },

    #[error("Placeholder '{name}' appears more than once in pattern '{pattern}'.")]
    DuplicatePlaceholder { pattern: String, name: String },
}

impl PatternError {
    #[inline]
    pub(crate) fn unbalanced_braces(pattern: impl Into<String>) -> Self {
        Self::UnbalancedBraces {
            pattern: pattern.into(),
        }
    }

    #[inline]
    pub(crate) fn empty_placeholder(segment: impl Into<String>) -> Self {
        Self::EmptyPlaceholder {
            segment: segment.into(),
        }
    }

    #[inline]
    pub(crate) fn mixed_segment(segment: impl Into<String>) -> Self {
        Self::MixedSegment {
            segment: segment.into(),
        }
    }

    #[inline]
    pub(crate) fn duplicate_placeholder(pattern: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicatePlaceholder {
            pattern: pattern.into(),
            name: name.into(),
        }
    }
}

/// Raised when a pattern is expanded without a value for one of its placeholders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Placeholder '{name}' has no value.")]
pub struct UnboundPlaceholder {
    pub name: String,
}

/// Splits a path into its non-empty segments.
///
/// # Behavior
/// Both `/` and `\` act as separators, so leading, trailing and repeated
/// separators never produce empty segments.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c| c == '/' || c == '\\')
        .filter(|segment| !segment.is_empty())
}

/// Normalizes a path or pattern.
///
/// # Parameters
/// - `path`: raw path or pattern, e.g. `"//users//42/?tab=1"`
///
/// # Returns
/// The path with a single leading slash, no trailing slash, collapsed
/// separators and no query string (`"/users/42"`). Anything that contains
/// no segment at all normalizes to the root `"/"`.
///
/// # Examples
/// ```rust
/// use routeline::router::pattern::normalize;
///
/// assert_eq!(normalize("api//users/"), "/api/users");
/// assert_eq!(normalize("\\admin\\settings"), "/admin/settings");
/// assert_eq!(normalize("///"), "/");
/// ```
pub fn normalize(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in split_path(path) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// One segment of a route pattern.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub enum Segment {
    /// Text that must equal the request segment exactly (case-sensitive).
    Literal(String),

    /// A `{name}` segment that binds any non-empty request segment.
    Placeholder(String),
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Literal(literal) => write!(f, "{}", literal),
            Segment::Placeholder(name) => write!(f, "{{{}}}", name),
        }
    }
}

impl FromStr for Segment {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            Some("") => Err(PatternError::empty_placeholder(s)),
            Some(name) if name.contains(['{', '}']) => Err(PatternError::mixed_segment(s)),
            Some(name) => Ok(Segment::Placeholder(name.to_string())),
            None if s.contains(['{', '}']) => Err(PatternError::mixed_segment(s)),
            None => Ok(Segment::Literal(s.to_string())),
        }
    }
}

/// A normalized request path ready to be compared against patterns.
///
/// The root path counts as a single empty segment so that it can only be
/// matched by the root pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    normalized: String,
    segment_count: usize,
}

impl RequestPath {
    pub fn parse(path: &str) -> Self {
        let normalized = normalize(path);
        let segment_count = normalized.matches('/').count();
        Self {
            normalized,
            segment_count,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.normalized[1..].split('/')
    }
}

/// A parsed route pattern such as `/users/{id}/posts/{post}`.
///
/// # Behavior
/// Patterns are normalized with [`normalize`] before their segments are
/// parsed. Matching first compares segment counts and only walks the segments
/// pairwise when the counts are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl Pattern {
    /// Parses and normalizes a raw pattern.
    ///
    /// # Errors
    /// - [`PatternError::Empty`] for a pattern whose path part is empty or blank.
    /// - [`PatternError::UnbalancedBraces`] for unmatched or nested braces.
    /// - [`PatternError::EmptyPlaceholder`] / [`PatternError::MixedSegment`]
    ///   for malformed segments.
    /// - [`PatternError::DuplicatePlaceholder`] when a name is used twice.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let path = raw.split('?').next().unwrap_or_default();
        if path.trim().is_empty() {
            return Err(PatternError::Empty);
        }
        check_braces(raw)?;

        let source = normalize(raw);
        if source == "/" {
            return Ok(Self {
                source,
                segments: vec![Segment::Literal(String::new())],
                param_names: Vec::new(),
            });
        }

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();
        for segment in source[1..].split('/') {
            let segment = Segment::from_str(segment)?;
            if let Segment::Placeholder(name) = &segment {
                if param_names.contains(name) {
                    return Err(PatternError::duplicate_placeholder(&source, name));
                }
                param_names.push(name.clone());
            }
            segments.push(segment);
        }
        Ok(Self {
            source,
            segments,
            param_names,
        })
    }

    /// Parses `prefix + "/" + self` into a new pattern.
    pub fn with_prefix(&self, prefix: &str) -> Result<Self, PatternError> {
        Self::parse(&format!("{}/{}", prefix, self.source))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// `true` when the pattern has no placeholder.
    pub fn is_static(&self) -> bool {
        self.param_names.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.source == "/"
    }

    /// Matches a request path against this pattern.
    ///
    /// # Returns
    /// - `Some(params)` with one entry per placeholder, in pattern order.
    /// - `None` when the segment counts differ, a literal differs or a
    ///   placeholder would bind an empty segment.
    ///
    /// # Examples
    /// ```rust
    /// use routeline::router::pattern::{Pattern, RequestPath};
    ///
    /// let pattern = Pattern::parse("/users/{id}").unwrap();
    /// let params = pattern.matches(&RequestPath::parse("/users/42")).unwrap();
    /// assert_eq!(params.get("id"), Some("42"));
    /// assert!(pattern.matches(&RequestPath::parse("/users/42/posts")).is_none());
    /// ```
    pub fn matches(&self, path: &RequestPath) -> Option<Params> {
        if self.segment_count() != path.segment_count() {
            return None;
        }
        let mut params = Params::with_capacity(self.param_names.len());
        for (segment, value) in self.segments.iter().zip(path.segments()) {
            match segment {
                Segment::Literal(literal) if literal == value => {}
                Segment::Placeholder(name) if !value.is_empty() => {
                    log::trace!("Bound placeholder '{name}' to '{value}'");
                    params.bind(name.as_str(), value);
                }
                _ => return None,
            }
        }
        Some(params)
    }

    /// Builds a concrete path by substituting every placeholder.
    pub fn expand<'a, F>(&self, mut lookup: F) -> Result<String, UnboundPlaceholder>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        if self.is_root() {
            return Ok(self.source.clone());
        }
        let mut path = String::with_capacity(self.source.len());
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) if !value.is_empty() => path.push_str(value),
                    _ => return Err(UnboundPlaceholder { name: name.clone() }),
                },
            }
        }
        Ok(path)
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn check_braces(raw: &str) -> Result<(), PatternError> {
    let mut open = false;
    for c in raw.chars() {
        match c {
            '{' if open => return Err(PatternError::unbalanced_braces(raw)),
            '{' => open = true,
            '}' if !open => return Err(PatternError::unbalanced_braces(raw)),
            '}' => open = false,
            _ => {}
        }
    }
    if open {
        return Err(PatternError::unbalanced_braces(raw));
    }
    Ok(())
}
