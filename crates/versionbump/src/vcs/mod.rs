//! Version control backends.
//!
//! Backends are probed in a fixed order of preference, see [`Backend::detect`].
pub mod git;
pub mod hg;

#[cfg(test)]
pub mod temp;

use crate::template::{MissingKeyError, Template};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command failed: {0}")]
    CommandFailed(#[from] crate::command::Error),

    #[error("invalid tag: {0}")]
    InvalidTag(#[from] git::InvalidTagError),

    #[error("failed to template tag name {template}")]
    MissingKey {
        #[source]
        source: MissingKeyError,
        template: Template,
    },

    #[error(
        "{tool} working directory is not clean:\n\n{}",
        .files.iter().map(|file| file.to_string_lossy()).collect::<Vec<_>>().join("\n")
    )]
    DirtyWorkingTree {
        tool: &'static str,
        files: Vec<PathBuf>,
    },
}

/// Information about the latest version tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagInfo {
    /// Whether tracked files have uncommitted changes.
    pub dirty: bool,
    pub commit_sha: String,
    /// Number of commits since the tag.
    pub distance_to_latest_tag: usize,
    pub current_tag: String,
    /// The version extracted from the tag name.
    pub current_version: String,
}

#[allow(async_fn_in_trait)]
pub trait VersionControlSystem {
    /// Name of the tool, used in messages.
    const NAME: &'static str;

    /// Get the path of the working directory.
    fn path(&self) -> &Path;

    /// Whether the tool is installed and the working directory is a repository.
    async fn is_usable(&self) -> bool;

    /// Information about the latest tag matching `tag_name`, if there is one.
    ///
    /// `tag_name` is the tag name template, in which `{new_version}` stands for the version.
    async fn latest_tag_info(&self, tag_name: &Template) -> Result<Option<TagInfo>, Error>;

    /// Tracked files with uncommitted modifications.
    ///
    /// Untracked files are ignored.
    async fn dirty_files(&self) -> Result<Vec<PathBuf>, Error>;

    /// Fail if any tracked file has uncommitted modifications.
    async fn assert_nondirty(&self) -> Result<(), Error> {
        let files = self.dirty_files().await?;
        if files.is_empty() {
            Ok(())
        } else {
            Err(Error::DirtyWorkingTree {
                tool: Self::NAME,
                files,
            })
        }
    }

    /// Add files to the staging area.
    async fn add(&self, files: &[impl AsRef<Path>]) -> Result<(), Error>;

    /// Commit staged changes.
    async fn commit(&self, message: &str, extra_args: &[String]) -> Result<(), Error>;

    /// Create a new tag.
    async fn tag(&self, name: &str) -> Result<(), Error>;
}

/// One of the supported version control systems.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Backend {
    Git(git::GitRepository),
    Mercurial(hg::MercurialRepository),
}

impl Backend {
    /// Use the first usable backend for `path`, preferring git over mercurial.
    pub async fn detect(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let git = git::GitRepository::open(path.clone());
        if git.is_usable().await {
            return Some(Self::Git(git));
        }
        let hg = hg::MercurialRepository::open(path);
        if hg.is_usable().await {
            return Some(Self::Mercurial(hg));
        }
        tracing::debug!("no usable version control system found");
        None
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Git(_) => git::GitRepository::NAME,
            Self::Mercurial(_) => hg::MercurialRepository::NAME,
        }
    }
}

impl VersionControlSystem for Backend {
    /// Placeholder for the enum as a whole; use [`Backend::name`] for the detected tool.
    const NAME: &'static str = "vcs";

    fn path(&self) -> &Path {
        match self {
            Self::Git(repo) => repo.path(),
            Self::Mercurial(repo) => repo.path(),
        }
    }

    async fn is_usable(&self) -> bool {
        match self {
            Self::Git(repo) => repo.is_usable().await,
            Self::Mercurial(repo) => repo.is_usable().await,
        }
    }

    async fn latest_tag_info(&self, tag_name: &Template) -> Result<Option<TagInfo>, Error> {
        match self {
            Self::Git(repo) => repo.latest_tag_info(tag_name).await,
            Self::Mercurial(repo) => repo.latest_tag_info(tag_name).await,
        }
    }

    async fn dirty_files(&self) -> Result<Vec<PathBuf>, Error> {
        match self {
            Self::Git(repo) => repo.dirty_files().await,
            Self::Mercurial(repo) => repo.dirty_files().await,
        }
    }

    async fn assert_nondirty(&self) -> Result<(), Error> {
        match self {
            Self::Git(repo) => repo.assert_nondirty().await,
            Self::Mercurial(repo) => repo.assert_nondirty().await,
        }
    }

    async fn add(&self, files: &[impl AsRef<Path>]) -> Result<(), Error> {
        match self {
            Self::Git(repo) => repo.add(files).await,
            Self::Mercurial(repo) => repo.add(files).await,
        }
    }

    async fn commit(&self, message: &str, extra_args: &[String]) -> Result<(), Error> {
        match self {
            Self::Git(repo) => repo.commit(message, extra_args).await,
            Self::Mercurial(repo) => repo.commit(message, extra_args).await,
        }
    }

    async fn tag(&self, name: &str) -> Result<(), Error> {
        match self {
            Self::Git(repo) => repo.tag(name).await,
            Self::Mercurial(repo) => repo.tag(name).await,
        }
    }
}

/// Parse status output into paths below `root`, skipping untracked (`??`) entries.
///
/// Each line is expected to start with a status code followed by whitespace and the path.
/// Renames (`old -> new`) report the new path.
pub(crate) fn parse_status_lines(root: &Path, output: &str) -> Vec<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("??"))
        .filter_map(|line| line.split_once(char::is_whitespace))
        .map(|(_, file)| {
            let file = file.rsplit_once(" -> ").map_or(file, |(_, renamed)| renamed);
            root.join(file.trim())
        })
        .collect()
}
