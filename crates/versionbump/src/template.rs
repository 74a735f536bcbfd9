//! Templates with `{name}` placeholders used to render versions, commit messages and tags.
//!
//! Only plain placeholders are understood. `{{` and `}}` escape literal braces and a
//! placeholder may carry a format spec (`{utcnow:%Y%m%d}`), which is applied to
//! timestamp values only.
pub use parser::ParseError;
use std::collections::HashMap;

/// A segment of a template: either literal text or a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Text(String),
    Placeholder {
        name: String,
        format_spec: Option<String>,
    },
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{}", text.replace('{', "{{").replace('}', "}}")),
            Self::Placeholder {
                name,
                format_spec: None,
            } => write!(f, "{{{name}}}"),
            Self::Placeholder {
                name,
                format_spec: Some(spec),
            } => write!(f, "{{{name}:{spec}}}"),
        }
    }
}

impl Segment {
    /// If this is a placeholder, return its name, otherwise `None`.
    ///
    /// # Examples
    /// ```
    /// use versionbump::template::Segment;
    /// let segment = Segment::Placeholder { name: "major".to_string(), format_spec: None };
    /// assert_eq!(segment.as_placeholder(), Some("major"));
    /// assert_eq!(Segment::Text("major".to_string()).as_placeholder(), None);
    /// ```
    #[must_use]
    pub fn as_placeholder(&self) -> Option<&str> {
        match self {
            Self::Placeholder { name, .. } => Some(name),
            Self::Text(_) => None,
        }
    }
}

impl<'a> From<parser::Value<'a>> for Segment {
    fn from(value: parser::Value<'a>) -> Self {
        match value {
            parser::Value::Text(text) => Self::Text(text),
            parser::Value::Placeholder(inner) => match inner.split_once(':') {
                Some((name, spec)) => Self::Placeholder {
                    name: name.to_string(),
                    format_spec: Some(spec.to_string()),
                },
                None => Self::Placeholder {
                    name: inner.to_string(),
                    format_spec: None,
                },
            },
        }
    }
}

pub mod parser {
    //! Splits template strings into text and placeholders.
    use winnow::combinator::{alt, delimited, repeat};
    use winnow::error::InputError;
    use winnow::prelude::*;
    use winnow::token::take_while;

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Value<'a> {
        Text(String),
        Placeholder(&'a str),
    }

    fn any_except_curly_bracket0<'a>(s: &mut &'a str) -> ModalResult<&'a str, InputError<&'a str>> {
        take_while(0.., |c| c != '{' && c != '}')
            .context("any_except_curly_bracket0")
            .parse_next(s)
    }

    fn any_except_curly_bracket1<'a>(s: &mut &'a str) -> ModalResult<&'a str, InputError<&'a str>> {
        take_while(1.., |c| c != '{' && c != '}')
            .context("any_except_curly_bracket1")
            .parse_next(s)
    }

    fn text_including_escaped_brackets<'a>(
        s: &mut &'a str,
    ) -> ModalResult<String, InputError<&'a str>> {
        repeat(
            1..,
            alt((any_except_curly_bracket1, "{{".value("{"), "}}".value("}"))),
        )
        .fold(String::new, |mut string, c| {
            string.push_str(c);
            string
        })
        .context("text_including_escaped_brackets")
        .parse_next(s)
    }

    fn placeholder<'a>(s: &mut &'a str) -> ModalResult<Value<'a>, InputError<&'a str>> {
        delimited("{", any_except_curly_bracket0, "}")
            .map(Value::Placeholder)
            .context("placeholder")
            .parse_next(s)
    }

    fn text_or_placeholder<'a>(s: &mut &'a str) -> ModalResult<Value<'a>, InputError<&'a str>> {
        alt((text_including_escaped_brackets.map(Value::Text), placeholder))
            .context("text_or_placeholder")
            .parse_next(s)
    }

    #[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
    #[error("invalid template: {template:?}")]
    pub struct ParseError {
        pub template: String,
    }

    /// Parse a template into a sequence of `Value` segments.
    ///
    /// # Errors
    /// When the template contains an unbalanced curly bracket.
    pub fn parse_template(value: &str) -> Result<Vec<Value<'_>>, ParseError> {
        repeat(0.., text_or_placeholder)
            .parse(value)
            .map_err(|_| ParseError {
                template: value.to_string(),
            })
    }

}

/// A name referenced by a template could not be resolved.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, PartialOrd, Hash)]
#[error("missing key {0:?}")]
pub struct MissingKeyError(pub String);

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Template(pub Vec<Segment>);

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for Template {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl AsRef<[Segment]> for Template {
    fn as_ref(&self) -> &[Segment] {
        &self.0
    }
}

impl std::str::FromStr for Template {
    type Err = ParseError;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Re-render an RFC 3339 timestamp using a strftime-style `format_spec`.
fn format_timestamp(value: &str, format_spec: &str) -> Option<String> {
    use std::fmt::Write;
    let timestamp = chrono::DateTime::parse_from_rfc3339(value).ok()?;
    let mut formatted = String::new();
    // invalid specs make the chrono formatter fail instead of panicking in `to_string`
    write!(formatted, "{}", timestamp.format(format_spec)).ok()?;
    Some(formatted)
}

impl Template {
    /// Parse a template string.
    ///
    /// # Errors
    /// When the template contains an unbalanced curly bracket.
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let segments = parser::parse_template(value)?;
        Ok(Self(segments.into_iter().map(Into::into).collect()))
    }

    /// Names of all placeholders in order of appearance.
    ///
    /// Names can repeat if a placeholder is used more than once.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(Segment::as_placeholder)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    /// Substitute every placeholder with the value returned by `resolve`.
    ///
    /// # Errors
    /// With the name of the first placeholder that `resolve` has no value for.
    pub fn render<'v, F>(&self, mut resolve: F) -> Result<String, MissingKeyError>
    where
        F: FnMut(&str) -> Option<&'v str>,
    {
        self.0.iter().try_fold(String::new(), |mut acc, segment| {
            match segment {
                Segment::Text(text) => acc.push_str(text),
                Segment::Placeholder { name, format_spec } => {
                    let value = resolve(name).ok_or_else(|| MissingKeyError(name.clone()))?;
                    match format_spec
                        .as_deref()
                        .and_then(|spec| format_timestamp(value, spec))
                    {
                        Some(formatted) => acc.push_str(&formatted),
                        None => acc.push_str(value),
                    }
                }
            }
            Ok(acc)
        })
    }

    /// Render the template using a map of values.
    ///
    /// When `strict` is false, unknown placeholders render as empty strings.
    ///
    /// # Errors
    /// When `strict` is set and a placeholder has no value.
    pub fn format<K, V, S>(
        &self,
        values: &HashMap<K, V, S>,
        strict: bool,
    ) -> Result<String, MissingKeyError>
    where
        K: std::borrow::Borrow<str> + std::hash::Hash + Eq,
        V: AsRef<str>,
        S: std::hash::BuildHasher,
    {
        self.render(|name| {
            values
                .get(name)
                .map(AsRef::as_ref)
                .or(if strict { None } else { Some("") })
        })
    }
}
