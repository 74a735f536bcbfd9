use crate::template::{MissingKeyError, Template};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Bumping of the first run of digits inside a component value.
pub mod numeric {
    /// Matches the first run of digits along with everything before and after it.
    pub static FIRST_NUMERIC_REGEX: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| {
            regex::RegexBuilder::new(r"^(?P<prefix>[^0-9]*)(?P<number>[0-9]+)(?P<suffix>.*)$")
                .dot_matches_new_line(true)
                .build()
                .unwrap()
        });

    /// Add one to a run of ASCII digits.
    ///
    /// Leading zeros are dropped, so `"009"` becomes `"10"`.
    /// There is no upper bound on the number of digits.
    #[must_use]
    pub fn increment_digits(digits: &str) -> String {
        let digits = digits.trim_start_matches('0');
        let mut bumped: Vec<u8> = digits.bytes().collect();
        let mut carry = true;
        for digit in bumped.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            bumped.insert(0, b'1');
        }
        bumped.into_iter().map(char::from).collect()
    }

    /// Increase the first number in `value` by one.
    ///
    /// Returns `None` if `value` does not contain a digit.
    #[must_use]
    pub fn bump(value: &str) -> Option<String> {
        let first_numeric = FIRST_NUMERIC_REGEX.captures(value)?;
        let prefix = first_numeric.name("prefix")?.as_str();
        let number = first_numeric.name("number")?.as_str();
        let suffix = first_numeric.name("suffix")?.as_str();
        Some(format!("{prefix}{}{suffix}", increment_digits(number)))
    }

}

/// Errors that can occur when bumping a version component.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BumpError {
    /// The value has no run of digits that could be increased.
    #[error("version component value {0:?} does not contain any digit")]
    PatternMismatch(String),
}

/// A single named segment of a version.
///
/// An empty value means the component is unset and counts as `"0"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component {
    value: String,
}

impl AsRef<str> for Component {
    fn as_ref(&self) -> &str {
        self.effective_value()
    }
}

impl Component {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The raw value as parsed, possibly empty.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value with empty normalized to `"0"`.
    #[must_use]
    pub fn effective_value(&self) -> &str {
        if self.value.is_empty() {
            "0"
        } else {
            &self.value
        }
    }

    /// Whether the component may be left out of a rendered version.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.effective_value() == "0"
    }

    /// Increase the first number of the value by one, keeping prefix and suffix.
    ///
    /// # Errors
    /// When the effective value does not contain any digit.
    pub fn bump(&mut self) -> Result<(), BumpError> {
        let value = self.effective_value();
        let bumped =
            numeric::bump(value).ok_or_else(|| BumpError::PatternMismatch(value.to_string()))?;
        self.value = bumped;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.value = "0".to_string();
    }
}

/// The version string did not match the parse pattern.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("version {version:?} does not match parse pattern {pattern:?}")]
pub struct ParseWarning {
    pub version: String,
    pub pattern: String,
}

/// A version model was constructed without any serialization template.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("at least one serialization template is required")]
pub struct MissingTemplateError;

/// Errors that can occur when serializing a `Version`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// None of the templates could be rendered with the parsed components and context.
    #[error("version {version} has no suitable serialization format among {formats:?}")]
    NoSuitableFormat {
        version: String,
        formats: Vec<String>,
        #[source]
        last_missing_key: Option<MissingKeyError>,
    },
}

/// Parses, bumps and renders a version.
///
/// The context is fixed at construction so that rendering never reads the clock or the
/// environment.
#[derive(Debug, Clone)]
pub struct Version {
    parse_pattern: regex::Regex,
    serialize_patterns: Vec<Template>,
    context: HashMap<String, String>,
    components: IndexMap<String, Component>,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.components
                    .iter()
                    .map(|(name, component)| (name, component.value())),
            )
            .finish()
    }
}

impl<'a> IntoIterator for &'a Version {
    type Item = (&'a String, &'a Component);
    type IntoIter = indexmap::map::Iter<'a, String, Component>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Outcome of trying a single serialization template.
enum Attempt {
    /// Every component that needs representation is part of the template.
    Complete(String),
    /// The template renders but would drop a component that needs representation.
    Incomplete(String),
}

impl Version {
    /// Create a model from a parse pattern, serialization templates and context.
    ///
    /// # Errors
    /// When `serialize_patterns` is empty.
    pub fn new<C, K, V>(
        parse_pattern: regex::Regex,
        serialize_patterns: Vec<Template>,
        context: C,
    ) -> Result<Self, MissingTemplateError>
    where
        C: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if serialize_patterns.is_empty() {
            return Err(MissingTemplateError);
        }
        Ok(Self {
            parse_pattern,
            serialize_patterns,
            context: context
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            components: IndexMap::new(),
        })
    }

    /// Parse a version string into components.
    ///
    /// The pattern is searched anywhere in `version`. One component is created per named
    /// group that took part in the match. Previously parsed components are discarded.
    ///
    /// # Errors
    /// When the pattern does not match. The model is left without components and can still
    /// be used, so callers may treat this as a warning.
    pub fn parse(&mut self, version: &str) -> Result<(), ParseWarning> {
        self.components.clear();
        tracing::debug!(version, pattern = self.parse_pattern.as_str(), "parsing version");

        let Some(matches) = self.parse_pattern.captures(version) else {
            let warning = ParseWarning {
                version: version.to_string(),
                pattern: self.parse_pattern.as_str().to_string(),
            };
            tracing::warn!("{warning}");
            return Err(warning);
        };

        self.components = self
            .parse_pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                matches
                    .name(name)
                    .map(|value| (name.to_string(), Component::new(value.as_str())))
            })
            .collect();

        tracing::debug!(version = %self, "parsed version");
        Ok(())
    }

    /// Retrieve a component by its name.
    pub fn get<Q>(&self, component: &Q) -> Option<&Component>
    where
        Q: ?Sized + std::hash::Hash + indexmap::Equivalent<String>,
    {
        self.components.get(component)
    }

    /// Iterate over the parsed components in the order of the parse pattern.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Component> {
        self.components.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component names from most to least significant.
    ///
    /// Significance is the order in which names first appear in the first serialization
    /// template, which is expected to be the most complete one.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.serialize_patterns
            .iter()
            .take(1)
            .flat_map(Template::labels)
            .filter(move |label| seen.insert(*label))
    }

    /// Increase the component `part` and reset all less significant components to zero.
    ///
    /// More significant components are left untouched. Returns `false` if `part` is not a
    /// parsed component of the first serialization template, in which case nothing changes.
    ///
    /// # Errors
    /// When the component value has no digit to increase.
    pub fn bump(&mut self, part: &str) -> Result<bool, BumpError> {
        let order: Vec<String> = self.order().map(str::to_string).collect();
        let mut bumped = false;
        for label in &order {
            let Some(component) = self.components.get_mut(label) else {
                continue;
            };
            if label == part {
                component.bump()?;
                bumped = true;
            } else if bumped {
                component.reset();
            }
        }
        if !bumped {
            tracing::debug!(part, "component to bump is not part of the version");
        }
        Ok(bumped)
    }

    /// Resolve a template name, preferring parsed components over the context.
    fn resolve(&self, name: &str) -> Option<&str> {
        self.components
            .get(name)
            .map(Component::effective_value)
            .or_else(|| self.context.get(name).map(String::as_str))
    }

    /// Components that a complete rendering must contain.
    ///
    /// Scanning from the most significant component, leading optional components are
    /// needed, and after the first required component only required ones are.
    fn keys_needing_representation(&self) -> HashSet<&str> {
        let ordered = self.order().filter(|name| self.components.contains_key(*name));
        let remaining = self
            .components
            .keys()
            .map(String::as_str)
            .filter(|name| !self.order().any(|label| label == *name));

        let mut needed = HashSet::new();
        let mut found_required = false;
        for name in ordered.chain(remaining) {
            if !self.components[name].is_optional() {
                found_required = true;
                needed.insert(name);
            } else if !found_required {
                needed.insert(name);
            }
        }
        needed
    }

    fn try_serialize(
        &self,
        template: &Template,
        needed: &HashSet<&str>,
    ) -> Result<Attempt, MissingKeyError> {
        let serialized = template.render(|name| self.resolve(name))?;
        let required_labels: HashSet<&str> = template.labels().collect();
        if needed.is_subset(&required_labels) {
            Ok(Attempt::Complete(serialized))
        } else {
            Ok(Attempt::Incomplete(serialized))
        }
    }

    /// Render the version using the best of the serialization templates.
    ///
    /// Templates are tried in their configured order and the choice does NOT stop at the
    /// first complete one:
    /// - a complete template replaces whatever was chosen before, so the last complete
    ///   template wins
    /// - an incomplete template is only used if nothing was chosen yet
    /// - a template with a missing key is skipped and keeps the previous choice
    ///
    /// Which template is preferred is therefore controlled by the order of the list.
    ///
    /// # Errors
    /// When no template can be rendered.
    pub fn serialize(&self) -> Result<String, SerializeError> {
        let needed = self.keys_needing_representation();
        tracing::debug!(?needed, "components needing representation");

        let mut chosen: Option<String> = None;
        let mut last_missing_key = None;
        for template in &self.serialize_patterns {
            match self.try_serialize(template, &needed) {
                Ok(Attempt::Complete(serialized)) => {
                    tracing::debug!(%template, serialized, "complete format");
                    chosen = Some(serialized);
                }
                Ok(Attempt::Incomplete(serialized)) => {
                    tracing::debug!(%template, serialized, "incomplete format");
                    if chosen.is_none() {
                        chosen = Some(serialized);
                    }
                }
                Err(err) => {
                    tracing::debug!(%template, "skipping format: {err}");
                    last_missing_key = Some(err);
                }
            }
        }

        chosen.ok_or_else(|| SerializeError::NoSuitableFormat {
            version: self.to_string(),
            formats: self
                .serialize_patterns
                .iter()
                .map(ToString::to_string)
                .collect(),
            last_missing_key,
        })
    }
}
