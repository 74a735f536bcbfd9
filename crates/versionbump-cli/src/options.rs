use clap::Parser;
use std::path::PathBuf;
use versionbump::config::Config;

/// Logging flags to `#[command(flatten)]` into your CLI
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct Verbosity {
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase output verbosity",
        long_help = None,
    )]
    pub verbose: u8,

    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        help = "Silence all output",
        long_help = None,
        conflicts_with = "verbose",
    )]
    pub quiet: u8,
}

impl From<Verbosity> for versionbump::logging::Verbosity {
    fn from(value: Verbosity) -> Self {
        if value.quiet > 0 {
            Self::Off
        } else {
            Self::from(value.verbose.saturating_add(1))
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "versionbump",
    version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
    about = "bump a version and update it in files",
)]
pub struct Options {
    #[clap(
        long = "dir",
        help = "repository directory to run versionbump in",
        env = "BUMPVERSION_DIR"
    )]
    pub dir: Option<PathBuf>,

    #[clap(
        long = "config-file",
        help = "config file to read most of the variables from",
        env = "BUMPVERSION_CONFIG_FILE"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long = "color",
        env = "BUMPVERSION_COLOR",
        help = "enable or disable color"
    )]
    pub color_choice: Option<termcolor::ColorChoice>,

    #[command(flatten)]
    pub verbosity: Verbosity,

    #[arg(
        long = "log",
        env = "BUMPVERSION_LOG_LEVEL",
        aliases = ["log-level"],
        help = "Log level. When using a more sophisticated logging setup using RUST_LOG environment variable, this option is overwritten."
    )]
    pub log_level: Option<tracing::metadata::Level>,

    #[arg(
        long = "log-format",
        env = "BUMPVERSION_LOG_FORMAT",
        help = "log format (json, pretty or pretty-compact)"
    )]
    pub log_format: Option<crate::logging::LogFormat>,

    #[clap(
        long = "current-version",
        help = "version that needs to be updated",
        env = "BUMPVERSION_CURRENT_VERSION"
    )]
    pub current_version: Option<String>,

    #[clap(
        long = "new-version",
        help = "new version that should be in the files",
        env = "BUMPVERSION_NEW_VERSION"
    )]
    pub new_version: Option<String>,

    #[clap(
        long = "parse",
        help = "regex parsing the version string",
        env = "BUMPVERSION_PARSE"
    )]
    pub parse_pattern: Option<String>,

    #[clap(
        long = "serialize",
        help = "how to format what is parsed back to a version",
        env = "BUMPVERSION_SERIALIZE"
    )]
    pub serialize: Vec<String>,

    #[clap(
        short = 'n',
        long = "dry-run",
        help = "don't write any files, just pretend.",
        env = "BUMPVERSION_DRY_RUN",
        action = clap::ArgAction::SetTrue
    )]
    pub dry_run: bool,

    #[clap(
        long = "commit",
        help = "commit to version control",
        env = "BUMPVERSION_COMMIT",
        action = clap::ArgAction::SetTrue,
        conflicts_with = "no_commit",
    )]
    pub commit: bool,

    #[clap(
        long = "no-commit",
        help = "do not commit to version control",
        env = "BUMPVERSION_NO_COMMIT",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_commit: bool,

    #[clap(
        long = "tag",
        help = "create a tag in version control",
        env = "BUMPVERSION_TAG",
        action = clap::ArgAction::SetTrue,
        conflicts_with = "no_tag",
    )]
    pub tag: bool,

    #[clap(
        long = "no-tag",
        help = "do not create a tag in version control",
        env = "BUMPVERSION_NO_TAG",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_tag: bool,

    #[clap(
        long = "tag-name",
        help = "tag name (only works with --tag)",
        env = "BUMPVERSION_TAG_NAME"
    )]
    pub tag_name: Option<String>,

    #[clap(
        short = 'm',
        long = "message",
        help = "commit message",
        env = "BUMPVERSION_MESSAGE"
    )]
    pub commit_message: Option<String>,

    #[clap(
        long = "commit-args",
        help = "extra arguments to commit command",
        env = "BUMPVERSION_COMMIT_ARGS",
        allow_hyphen_values = true
    )]
    pub commit_args: Option<String>,

    #[clap(
        long = "allow-dirty",
        help = "don't abort if working directory is dirty",
        env = "BUMPVERSION_ALLOW_DIRTY",
        action = clap::ArgAction::SetTrue,
        conflicts_with = "no_allow_dirty",
    )]
    pub allow_dirty: bool,

    #[clap(
        long = "no-allow-dirty",
        help = "explicitly abort if dirty",
        env = "BUMPVERSION_NO_ALLOW_DIRTY",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_allow_dirty: bool,

    #[arg(help = "part of the version to be bumped", env = "BUMPVERSION_PART")]
    pub part: Option<String>,

    #[arg(help = "files to change, replacing the configured files")]
    pub files: Vec<PathBuf>,
}

/// Combine a `--flag` / `--no-flag` pair, leaving the value unset if neither is given.
fn flag(enabled: bool, disabled: bool) -> Option<bool> {
    match (enabled, disabled) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Config values set on the command line.
#[must_use]
pub fn cli_config(options: &Options) -> Config {
    Config {
        current_version: options.current_version.clone(),
        new_version: options.new_version.clone(),
        parse_version_pattern: options.parse_pattern.clone(),
        serialize_version_patterns: Some(options.serialize.clone()).filter(|s| !s.is_empty()),
        commit: flag(options.commit, options.no_commit),
        tag: flag(options.tag, options.no_tag),
        dry_run: flag(options.dry_run, false),
        allow_dirty: flag(options.allow_dirty, options.no_allow_dirty),
        files: Some(options.files.clone()).filter(|files| !files.is_empty()),
        tag_name: options.tag_name.clone(),
        commit_message: options.commit_message.clone(),
        commit_args: options.commit_args.clone(),
    }
}
