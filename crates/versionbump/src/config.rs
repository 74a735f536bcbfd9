//! Layered configuration read from `.bumpversion.cfg`.
//!
//! Values are merged in order of priority: command line, config file, latest tag, defaults.
use crate::{
    files::Modification,
    template::{self, Template},
    vcs::TagInfo,
};
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".bumpversion.cfg";
pub const SECTION: &str = "bumpversion";

pub const DEFAULT_PARSE_VERSION_PATTERN: &str = r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)";
pub const DEFAULT_SERIALIZE_VERSION_PATTERN: &str = "{major}.{minor}.{patch}";
pub const DEFAULT_TAG_NAME: &str = "v{new_version}";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Bump version: {current_version} → {new_version}";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to access config file {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to parse config: {0}")]
    Ini(String),

    #[error("config is missing the [{SECTION}] section")]
    MissingSection,

    #[error("invalid value for {key:?}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("invalid parse pattern {pattern:?}")]
    Regex {
        #[source]
        source: regex::Error,
        pattern: String,
    },

    #[error("invalid {key} template {value:?}")]
    Template {
        #[source]
        source: template::ParseError,
        key: &'static str,
        value: String,
    },

    #[error("at least one serialize format is required")]
    NoSerializeFormats,
}

pub trait MergeWith<T> {
    fn merge_with(&mut self, other: T);
}

impl<'a, T> MergeWith<Option<&'a T>> for Option<T>
where
    T: Clone,
{
    fn merge_with(&mut self, other: Option<&'a T>) {
        if self.is_none() {
            *self = other.cloned();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Config {
    /// Version that needs to be updated
    pub current_version: Option<String>,
    /// New version, skipping the bump
    pub new_version: Option<String>,
    /// Regex parsing the version string
    pub parse_version_pattern: Option<String>,
    /// How to serialize back to a version
    pub serialize_version_patterns: Option<Vec<String>>,
    /// Commit to version control
    pub commit: Option<bool>,
    /// Create a tag in version control
    pub tag: Option<bool>,
    /// Don't write any files, just pretend
    pub dry_run: Option<bool>,
    /// Don't abort if working directory is dirty
    pub allow_dirty: Option<bool>,
    /// Files to change
    pub files: Option<Vec<PathBuf>>,
    /// Tag name (only works with tag)
    pub tag_name: Option<String>,
    /// Commit message
    pub commit_message: Option<String>,
    /// Extra arguments to commit command
    pub commit_args: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FinalizedConfig {
    pub current_version: Option<String>,
    pub new_version: Option<String>,
    pub parse_version_pattern: regex::Regex,
    pub serialize_version_patterns: Vec<Template>,
    pub commit: bool,
    pub tag: bool,
    pub dry_run: bool,
    pub allow_dirty: bool,
    pub files: Vec<PathBuf>,
    pub tag_name: Template,
    pub commit_message: Template,
    pub commit_args: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_version: None,
            new_version: None,
            parse_version_pattern: Some(DEFAULT_PARSE_VERSION_PATTERN.to_string()),
            serialize_version_patterns: Some(vec![DEFAULT_SERIALIZE_VERSION_PATTERN.to_string()]),
            commit: Some(false),
            tag: Some(false),
            dry_run: Some(false),
            allow_dirty: Some(false),
            files: Some(vec![]),
            tag_name: Some(DEFAULT_TAG_NAME.to_string()),
            commit_message: Some(DEFAULT_COMMIT_MESSAGE.to_string()),
            commit_args: None,
        }
    }
}

impl<'a> MergeWith<&'a Config> for Config {
    fn merge_with(&mut self, other: &'a Config) {
        self.current_version
            .merge_with(other.current_version.as_ref());
        self.new_version.merge_with(other.new_version.as_ref());
        self.parse_version_pattern
            .merge_with(other.parse_version_pattern.as_ref());
        self.serialize_version_patterns
            .merge_with(other.serialize_version_patterns.as_ref());
        self.commit.merge_with(other.commit.as_ref());
        self.tag.merge_with(other.tag.as_ref());
        self.dry_run.merge_with(other.dry_run.as_ref());
        self.allow_dirty.merge_with(other.allow_dirty.as_ref());
        self.files.merge_with(other.files.as_ref());
        self.tag_name.merge_with(other.tag_name.as_ref());
        self.commit_message
            .merge_with(other.commit_message.as_ref());
        self.commit_args.merge_with(other.commit_args.as_ref());
    }
}

fn new_ini() -> Ini {
    let mut ini = Ini::new();
    let mut defaults = ini.defaults();
    // templates may contain colons, e.g. `{utcnow:%H}`
    defaults.delimiters = vec!['='];
    defaults.multiline = true;
    // only full-line comments, values may contain `#` and `;`
    defaults.enable_inline_comments = false;
    ini.load_defaults(defaults);
    ini
}

/// Split a multi-line value into its non-empty, trimmed lines.
fn list_value(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(Error::InvalidValue {
            key,
            message: format!("{value:?} is not a boolean"),
        }),
    }
}

impl Config {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            current_version: None,
            new_version: None,
            parse_version_pattern: None,
            serialize_version_patterns: None,
            commit: None,
            tag: None,
            dry_run: None,
            allow_dirty: None,
            files: None,
            tag_name: None,
            commit_message: None,
            commit_args: None,
        }
    }

    /// Config derived from the latest version tag.
    #[must_use]
    pub fn from_tag_info(tag_info: &TagInfo) -> Self {
        Self {
            current_version: Some(tag_info.current_version.clone()),
            ..Self::empty()
        }
    }

    /// Parse the `[bumpversion]` section of an INI config.
    ///
    /// # Errors
    /// When the config is malformed or has no `[bumpversion]` section.
    pub fn from_ini(contents: &str) -> Result<Self, Error> {
        let mut ini = new_ini();
        ini.read(contents.to_string()).map_err(Error::Ini)?;
        if !ini.sections().iter().any(|section| section == SECTION) {
            return Err(Error::MissingSection);
        }

        let get = |key: &str| {
            ini.get(SECTION, key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let get_bool = |key: &'static str| {
            get(key)
                .map(|value| parse_bool(key, &value))
                .transpose()
        };

        Ok(Self {
            current_version: get("current_version"),
            new_version: get("new_version"),
            parse_version_pattern: get("parse"),
            serialize_version_patterns: get("serialize")
                .map(|value| list_value(&value))
                .filter(|patterns| !patterns.is_empty()),
            commit: get_bool("commit")?,
            tag: get_bool("tag")?,
            dry_run: get_bool("dry_run")?,
            allow_dirty: get_bool("allow_dirty")?,
            files: get("files").map(|files| {
                files
                    .split_whitespace()
                    .map(PathBuf::from)
                    .collect::<Vec<_>>()
            }),
            tag_name: get("tag_name"),
            commit_message: get("message"),
            commit_args: get("commit_args"),
        })
    }

    /// Read a config file.
    ///
    /// # Errors
    /// When the file cannot be read or parsed.
    pub async fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Io {
                source,
                path: path.to_path_buf(),
            })?;
        Self::from_ini(&contents)
    }

    /// Finalize the config.
    ///
    /// All unset options are set to their default value, patterns and templates are compiled.
    ///
    /// # Errors
    /// When the parse pattern or any template is invalid.
    pub fn finalize(mut self) -> Result<FinalizedConfig, Error> {
        self.merge_with(&Config::default());

        let pattern = self
            .parse_version_pattern
            .unwrap_or_else(|| DEFAULT_PARSE_VERSION_PATTERN.to_string());
        let parse_version_pattern =
            regex::Regex::new(&pattern).map_err(|source| Error::Regex { source, pattern })?;

        let parse_template = |key: &'static str, value: String| {
            Template::parse(&value).map_err(|source| Error::Template { source, key, value })
        };

        let serialize_version_patterns = self
            .serialize_version_patterns
            .unwrap_or_default()
            .into_iter()
            .map(|pattern| parse_template("serialize", pattern))
            .collect::<Result<Vec<_>, _>>()?;
        if serialize_version_patterns.is_empty() {
            return Err(Error::NoSerializeFormats);
        }

        Ok(FinalizedConfig {
            current_version: self.current_version,
            new_version: self.new_version,
            parse_version_pattern,
            serialize_version_patterns,
            commit: self.commit.unwrap_or_default(),
            tag: self.tag.unwrap_or_default(),
            dry_run: self.dry_run.unwrap_or_default(),
            allow_dirty: self.allow_dirty.unwrap_or_default(),
            files: self.files.unwrap_or_default(),
            tag_name: parse_template(
                "tag_name",
                self.tag_name
                    .unwrap_or_else(|| DEFAULT_TAG_NAME.to_string()),
            )?,
            commit_message: parse_template(
                "message",
                self.commit_message
                    .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
            )?,
            commit_args: self.commit_args,
        })
    }
}

fn section_name(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix('[')
        .and_then(|line| line.strip_suffix(']'))
        .map(str::trim)
}

fn key_name(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    line.split_once('=').map(|(key, _)| key.trim())
}

/// Set `current_version` to `new_version` and remove `new_version` in the `[bumpversion]` section.
///
/// All other lines are kept as they are. Returns `None` if the section is missing.
#[must_use]
pub fn replace_current_version(contents: &str, new_version: &str) -> Option<String> {
    let mut out = String::with_capacity(contents.len());
    let mut in_section = false;
    let mut found_section = false;
    let mut replaced = false;
    let mut insert_at = None;
    let mut skipping_value = false;

    for line in contents.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];

        if let Some(name) = section_name(body) {
            skipping_value = false;
            in_section = name.eq_ignore_ascii_case(SECTION);
            out.push_str(line);
            if in_section && !found_section {
                found_section = true;
                insert_at = Some(out.len());
            }
            continue;
        }

        if skipping_value {
            // continuation lines of the removed value
            if body.starts_with(char::is_whitespace) && !body.trim().is_empty() {
                continue;
            }
            skipping_value = false;
        }

        match key_name(body) {
            Some(key) if in_section && key.eq_ignore_ascii_case("new_version") => {
                skipping_value = true;
            }
            Some(key) if in_section && key.eq_ignore_ascii_case("current_version") => {
                replaced = true;
                out.push_str("current_version = ");
                out.push_str(new_version);
                out.push_str(if ending.is_empty() { "\n" } else { ending });
            }
            _ => out.push_str(line),
        }
    }

    let insert_at = insert_at?;
    if !replaced {
        let mut line = format!("current_version = {new_version}\n");
        if !out[..insert_at].ends_with('\n') {
            line.insert(0, '\n');
        }
        out.insert_str(insert_at, &line);
    }
    Some(out)
}

/// Update the version in a config file.
///
/// # Errors
/// When the file cannot be read or written, or misses the `[bumpversion]` section.
pub async fn update_config_file(
    path: &Path,
    new_version: &str,
    dry_run: bool,
) -> Result<Modification, Error> {
    let io_err = |source| Error::Io {
        source,
        path: path.to_path_buf(),
    };
    let before = tokio::fs::read_to_string(path).await.map_err(io_err)?;
    let after = replace_current_version(&before, new_version).ok_or(Error::MissingSection)?;
    if !dry_run {
        tokio::fs::write(path, &after).await.map_err(io_err)?;
    }
    Ok(Modification {
        path: path.to_path_buf(),
        before,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, MergeWith};
    use crate::vcs::TagInfo;
    use color_eyre::eyre;
    use indoc::indoc;
    use similar_asserts::assert_eq as sim_assert_eq;
    use std::path::PathBuf;

    #[test]
    fn parse_full_config() -> eyre::Result<()> {
        crate::tests::init();
        let config = Config::from_ini(indoc! {r"
            [bumpversion]
            current_version = 1.2.3-rc1
            parse = (?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)(\-(?P<release>[a-z]+)(?P<build>\d+))?
            serialize =
                {major}.{minor}.{patch}-{release}{build}
                {major}.{minor}.{patch}
            commit = True
            tag = False
            files = setup.py README.md
            tag_name = release-{new_version}
            message = Release {new_version} on {utcnow:%Y-%m-%d}

            [other]
            current_version = 0.0.0
        "})?;
        sim_assert_eq!(config.current_version.as_deref(), Some("1.2.3-rc1"));
        sim_assert_eq!(
            config.serialize_version_patterns,
            Some(vec![
                "{major}.{minor}.{patch}-{release}{build}".to_string(),
                "{major}.{minor}.{patch}".to_string(),
            ])
        );
        sim_assert_eq!(config.commit, Some(true));
        sim_assert_eq!(config.tag, Some(false));
        sim_assert_eq!(config.dry_run, None);
        sim_assert_eq!(
            config.files,
            Some(vec![PathBuf::from("setup.py"), PathBuf::from("README.md")])
        );
        sim_assert_eq!(config.tag_name.as_deref(), Some("release-{new_version}"));
        sim_assert_eq!(
            config.commit_message.as_deref(),
            Some("Release {new_version} on {utcnow:%Y-%m-%d}")
        );
        sim_assert_eq!(config.new_version, None);
        Ok(())
    }

    #[test]
    fn values_keep_comment_characters() -> eyre::Result<()> {
        crate::tests::init();
        let config = Config::from_ini(indoc! {r"
            # release settings
            [bumpversion]
            ; full-line comments are skipped
            current_version = 1.2.3
            message = Bump #{new_version}; see CHANGELOG
            tag_name = rel;{new_version}
            parse = (?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)(#(?P<build>\d+))?
        "})?;
        sim_assert_eq!(config.current_version.as_deref(), Some("1.2.3"));
        sim_assert_eq!(
            config.commit_message.as_deref(),
            Some("Bump #{new_version}; see CHANGELOG")
        );
        sim_assert_eq!(config.tag_name.as_deref(), Some("rel;{new_version}"));
        sim_assert_eq!(
            config.parse_version_pattern.as_deref(),
            Some(r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)(#(?P<build>\d+))?")
        );

        let finalized = config.finalize()?;
        sim_assert_eq!(finalized.tag_name.to_string(), "rel;{new_version}");
        Ok(())
    }

    #[test]
    fn missing_section_is_an_error() {
        crate::tests::init();
        let err = Config::from_ini("[other]\ncurrent_version = 1.0.0\n").unwrap_err();
        assert!(matches!(err, super::Error::MissingSection), "{err:?}");
    }

    #[test]
    fn invalid_bool_is_an_error() {
        crate::tests::init();
        let err = Config::from_ini("[bumpversion]\ncommit = maybe\n").unwrap_err();
        assert!(
            matches!(err, super::Error::InvalidValue { key: "commit", .. }),
            "{err:?}"
        );
    }

    #[test]
    fn merge_prefers_higher_priority() -> eyre::Result<()> {
        crate::tests::init();
        let mut cli = Config {
            commit: Some(false),
            ..Config::empty()
        };
        let file = Config {
            current_version: Some("1.0.0".to_string()),
            commit: Some(true),
            tag: Some(true),
            ..Config::empty()
        };
        let tag = Config::from_tag_info(&TagInfo {
            current_version: "0.9.0".to_string(),
            ..TagInfo::default()
        });
        cli.merge_with(&file);
        cli.merge_with(&tag);

        sim_assert_eq!(cli.current_version.as_deref(), Some("1.0.0"));
        sim_assert_eq!(cli.commit, Some(false));
        sim_assert_eq!(cli.tag, Some(true));

        let finalized = cli.finalize()?;
        assert!(!finalized.commit);
        assert!(finalized.tag);
        assert!(!finalized.dry_run);
        sim_assert_eq!(finalized.tag_name.to_string(), super::DEFAULT_TAG_NAME);
        sim_assert_eq!(
            finalized.commit_message.to_string(),
            super::DEFAULT_COMMIT_MESSAGE
        );
        sim_assert_eq!(
            finalized.parse_version_pattern.as_str(),
            super::DEFAULT_PARSE_VERSION_PATTERN
        );
        sim_assert_eq!(finalized.serialize_version_patterns.len(), 1);
        Ok(())
    }

    #[test]
    fn finalize_rejects_invalid_values() {
        crate::tests::init();
        let invalid_regex = Config {
            parse_version_pattern: Some("(?P<major>\\d+".to_string()),
            ..Config::empty()
        };
        assert!(matches!(
            invalid_regex.finalize(),
            Err(super::Error::Regex { .. })
        ));

        let invalid_template = Config {
            tag_name: Some("v{new_version".to_string()),
            ..Config::empty()
        };
        assert!(matches!(
            invalid_template.finalize(),
            Err(super::Error::Template { key: "tag_name", .. })
        ));

        let no_formats = Config {
            serialize_version_patterns: Some(vec![]),
            ..Config::empty()
        };
        assert!(matches!(
            no_formats.finalize(),
            Err(super::Error::NoSerializeFormats)
        ));
    }

    #[test]
    fn replace_current_version_keeps_other_lines() {
        crate::tests::init();
        let before = indoc! {"
            # managed by versionbump
            [bumpversion]
            current_version = 1.2.3
            new_version = 1.3.0
            serialize =
              {major}.{minor}.{patch}
            commit = True

            [other]
            current_version = 1.2.3
        "};
        sim_assert_eq!(
            super::replace_current_version(before, "1.3.0").as_deref(),
            Some(indoc! {"
                # managed by versionbump
                [bumpversion]
                current_version = 1.3.0
                serialize =
                  {major}.{minor}.{patch}
                commit = True

                [other]
                current_version = 1.2.3
            "})
        );
    }

    #[test]
    fn replace_current_version_inserts_missing_key() {
        crate::tests::init();
        sim_assert_eq!(
            super::replace_current_version("[bumpversion]\ncommit = True\n", "2.0.0").as_deref(),
            Some("[bumpversion]\ncurrent_version = 2.0.0\ncommit = True\n")
        );
        sim_assert_eq!(
            super::replace_current_version("[bumpversion]", "2.0.0").as_deref(),
            Some("[bumpversion]\ncurrent_version = 2.0.0\n")
        );
        sim_assert_eq!(
            super::replace_current_version("[other]\nkey = 1\n", "2.0.0"),
            None
        );
    }

    #[test]
    fn replace_current_version_removes_multiline_new_version() {
        crate::tests::init();
        sim_assert_eq!(
            super::replace_current_version(
                "[bumpversion]\nnew_version =\n  1.0.0\ncurrent_version=0.9\n",
                "1.0.0"
            )
            .as_deref(),
            Some("[bumpversion]\ncurrent_version = 1.0.0\n")
        );
    }

    #[tokio::test]
    async fn update_config_file_respects_dry_run() -> eyre::Result<()> {
        crate::tests::init();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(super::CONFIG_FILE);
        tokio::fs::write(&path, "[bumpversion]\ncurrent_version = 0.1.0\n").await?;

        let modification = super::update_config_file(&path, "0.2.0", true).await?;
        sim_assert_eq!(modification.after, "[bumpversion]\ncurrent_version = 0.2.0\n");
        sim_assert_eq!(
            tokio::fs::read_to_string(&path).await?,
            "[bumpversion]\ncurrent_version = 0.1.0\n"
        );

        super::update_config_file(&path, "0.2.0", false).await?;
        let config = Config::from_file(&path).await?;
        sim_assert_eq!(config.current_version.as_deref(), Some("0.2.0"));
        Ok(())
    }
}
