use crate::{
    command::run_command,
    template::{Segment, Template},
    vcs::{parse_status_lines, Error, TagInfo, VersionControlSystem},
};
use async_process::Command;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTagError {
    #[error("tag {0:?} is missing commit SHA")]
    MissingCommitSha(String),
    #[error("tag {0:?} is missing distance to latest tag")]
    MissingDistanceToLatestTag(String),
    #[error("invalid distance to latest tag for {tag:?}")]
    InvalidDistanceToLatestTag {
        #[source]
        source: std::num::ParseIntError,
        tag: String,
    },
    #[error("tag {0:?} is missing current tag")]
    MissingCurrentTag(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitRepository {
    path: PathBuf,
}

/// Glob matching all tags rendered from `tag_name`, e.g. `v*` for `v{new_version}`.
///
/// # Errors
/// When `tag_name` uses placeholders other than `new_version`.
pub fn tag_match_pattern(tag_name: &Template) -> Result<String, Error> {
    let ctx: HashMap<&str, &str> = [("new_version", "*")].into_iter().collect();
    tag_name
        .format(&ctx, true)
        .map_err(|source| Error::MissingKey {
            source,
            template: tag_name.clone(),
        })
}

/// Literal text before and after `{new_version}` in the tag name template.
fn version_affixes(tag_name: &Template) -> (String, String) {
    let segments = tag_name.as_ref();
    let Some(idx) = segments
        .iter()
        .position(|segment| segment.as_placeholder() == Some("new_version"))
    else {
        return (String::new(), String::new());
    };
    let literal = |segments: &[Segment]| {
        segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text.as_str()),
                Segment::Placeholder { .. } => None,
            })
            .collect::<String>()
    };
    (literal(&segments[..idx]), literal(&segments[idx + 1..]))
}

/// Parse the output of `git describe --dirty --tags --long`.
///
/// The output has the form `<tag>-<distance>-g<sha>[-dirty]`. It is split from the right,
/// so tags containing dashes are kept intact.
///
/// # Errors
/// When the output is missing one of its parts.
pub fn parse_describe(raw: &str, tag_name: &Template) -> Result<TagInfo, InvalidTagError> {
    let raw_tag = raw.trim();
    let mut tag_parts: Vec<&str> = raw_tag.split('-').collect();

    let dirty = tag_parts
        .last()
        .is_some_and(|part| part.eq_ignore_ascii_case("dirty"));
    if dirty {
        let _ = tag_parts.pop();
    }

    let commit_sha = tag_parts
        .pop()
        .filter(|sha| !sha.is_empty())
        .ok_or_else(|| InvalidTagError::MissingCommitSha(raw_tag.to_string()))?
        .trim_start_matches('g')
        .to_string();

    let distance_to_latest_tag = tag_parts
        .pop()
        .ok_or_else(|| InvalidTagError::MissingDistanceToLatestTag(raw_tag.to_string()))?
        .parse::<usize>()
        .map_err(|source| InvalidTagError::InvalidDistanceToLatestTag {
            source,
            tag: raw_tag.to_string(),
        })?;

    let current_tag = tag_parts.join("-");
    if current_tag.is_empty() {
        return Err(InvalidTagError::MissingCurrentTag(raw_tag.to_string()));
    }

    let (prefix, suffix) = version_affixes(tag_name);
    let current_version = current_tag
        .strip_prefix(prefix.as_str())
        .and_then(|tag| tag.strip_suffix(suffix.as_str()))
        .unwrap_or(&current_tag)
        .to_string();

    tracing::debug!(
        dirty,
        commit_sha,
        distance_to_latest_tag,
        current_tag,
        current_version,
        "parsed latest tag"
    );

    Ok(TagInfo {
        dirty,
        commit_sha,
        distance_to_latest_tag,
        current_tag,
        current_version,
    })
}

impl GitRepository {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.path);
        cmd
    }

    /// The top-level directory of the working tree.
    async fn root(&self) -> Result<PathBuf, Error> {
        let mut cmd = self.command();
        cmd.args(["rev-parse", "--show-toplevel"]);
        let output = run_command(&mut cmd).await?;
        Ok(PathBuf::from(output.stdout.trim()))
    }
}

impl VersionControlSystem for GitRepository {
    const NAME: &'static str = "git";

    fn path(&self) -> &Path {
        &self.path
    }

    async fn is_usable(&self) -> bool {
        let mut cmd = self.command();
        cmd.args(["rev-parse", "--git-dir"]);
        match run_command(&mut cmd).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("git is not usable: {err}");
                false
            }
        }
    }

    async fn latest_tag_info(&self, tag_name: &Template) -> Result<Option<TagInfo>, Error> {
        // describe does not refresh the index itself
        let mut cmd = self.command();
        cmd.args(["update-index", "--refresh", "-q"]);
        if let Err(err) = run_command(&mut cmd).await {
            tracing::debug!("failed to update git index: {err}");
        }

        let match_tag_pattern_flag = format!("--match={}", tag_match_pattern(tag_name)?);
        let mut cmd = self.command();
        cmd.args([
            "describe",
            "--dirty",
            "--tags",
            "--long",
            "--abbrev=40",
            &match_tag_pattern_flag,
        ]);

        match run_command(&mut cmd).await {
            Ok(output) => Ok(Some(parse_describe(&output.stdout, tag_name)?)),
            Err(err @ crate::command::Error::Io(_)) => Err(err.into()),
            Err(err) => {
                tracing::debug!("no tag info: {err}");
                Ok(None)
            }
        }
    }

    async fn dirty_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut cmd = self.command();
        cmd.args(["status", "--porcelain"]);
        let output = run_command(&mut cmd).await?;
        // porcelain paths are relative to the top-level directory
        let root = self.root().await?;
        Ok(parse_status_lines(&root, &output.stdout))
    }

    async fn add(&self, files: &[impl AsRef<Path>]) -> Result<(), Error> {
        let mut cmd = self.command();
        cmd.args(["add", "--update"])
            .args(files.iter().map(|file| file.as_ref().as_os_str()));
        run_command(&mut cmd).await?;
        Ok(())
    }

    async fn commit(&self, message: &str, extra_args: &[String]) -> Result<(), Error> {
        // passing the message through a file keeps newlines and unicode intact
        let tmp = tempfile::TempDir::new()?;
        let message_file = tmp.path().join("commit-message.txt");
        tokio::fs::write(&message_file, message).await?;

        let mut cmd = self.command();
        cmd.arg("commit")
            .arg("-F")
            .arg(&message_file)
            .args(extra_args);
        run_command(&mut cmd).await?;
        Ok(())
    }

    async fn tag(&self, name: &str) -> Result<(), Error> {
        let mut cmd = self.command();
        cmd.args(["tag", name]);
        run_command(&mut cmd).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_describe, tag_match_pattern, InvalidTagError};
    use crate::{
        template::Template,
        vcs::{temp, TagInfo, VersionControlSystem},
    };
    use color_eyre::eyre;
    use similar_asserts::assert_eq as sim_assert_eq;
    use std::path::PathBuf;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn match_pattern_replaces_version() -> eyre::Result<()> {
        crate::tests::init();
        sim_assert_eq!(tag_match_pattern(&Template::parse("v{new_version}")?)?, "v*");
        sim_assert_eq!(
            tag_match_pattern(&Template::parse("release-{new_version}-final")?)?,
            "release-*-final"
        );
        assert!(tag_match_pattern(&Template::parse("{branch}-{new_version}")?).is_err());
        Ok(())
    }

    #[test]
    fn parses_clean_describe_output() -> eyre::Result<()> {
        crate::tests::init();
        let tag_name = Template::parse("v{new_version}")?;
        sim_assert_eq!(
            parse_describe(&format!("v1.2.3-4-g{SHA}\n"), &tag_name)?,
            TagInfo {
                dirty: false,
                commit_sha: SHA.to_string(),
                distance_to_latest_tag: 4,
                current_tag: "v1.2.3".to_string(),
                current_version: "1.2.3".to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn parses_dirty_tag_with_dashes() -> eyre::Result<()> {
        crate::tests::init();
        let tag_name = Template::parse("v{new_version}")?;
        let info = parse_describe(&format!("v2.0.0-rc-1-0-g{SHA}-dirty"), &tag_name)?;
        assert!(info.dirty);
        sim_assert_eq!(info.distance_to_latest_tag, 0);
        sim_assert_eq!(info.current_tag, "v2.0.0-rc-1");
        sim_assert_eq!(info.current_version, "2.0.0-rc-1");
        Ok(())
    }

    #[test]
    fn keeps_tag_without_expected_prefix() -> eyre::Result<()> {
        crate::tests::init();
        let tag_name = Template::parse("release/{new_version}")?;
        let info = parse_describe(&format!("1.0-2-g{SHA}"), &tag_name)?;
        sim_assert_eq!(info.current_version, "1.0");
        Ok(())
    }

    #[test]
    fn rejects_malformed_describe_output() -> eyre::Result<()> {
        crate::tests::init();
        let tag_name = Template::parse("v{new_version}")?;
        assert!(matches!(
            parse_describe("", &tag_name),
            Err(InvalidTagError::MissingCommitSha(_))
        ));
        assert!(matches!(
            parse_describe(&format!("g{SHA}"), &tag_name),
            Err(InvalidTagError::MissingDistanceToLatestTag(_))
        ));
        assert!(matches!(
            parse_describe(&format!("v1.0-x-g{SHA}"), &tag_name),
            Err(InvalidTagError::InvalidDistanceToLatestTag { .. })
        ));
        assert!(matches!(
            parse_describe(&format!("3-g{SHA}"), &tag_name),
            Err(InvalidTagError::MissingCurrentTag(_))
        ));
        Ok(())
    }

    #[ignore = "requires git"]
    #[tokio::test]
    async fn tag_info_and_dirty_files() -> eyre::Result<()> {
        crate::tests::init();
        let repo = temp::GitRepository::new().await?;
        assert!(repo.is_usable().await);

        let readme = repo.path().join("README.md");
        tokio::fs::write(&readme, "version 1.2.3").await?;
        repo.add_untracked(&[&readme]).await?;
        repo.commit("initial commit", &[]).await?;
        repo.tag("v1.2.3").await?;

        let tag_name = Template::parse("v{new_version}")?;
        let info = repo
            .latest_tag_info(&tag_name)
            .await?
            .ok_or_else(|| eyre::eyre!("missing tag info"))?;
        sim_assert_eq!(info.current_version, "1.2.3");
        sim_assert_eq!(info.distance_to_latest_tag, 0);
        assert!(!info.dirty);

        // untracked files do not make the tree dirty
        tokio::fs::write(repo.path().join("untracked.txt"), "hello").await?;
        sim_assert_eq!(repo.dirty_files().await?, Vec::<PathBuf>::new());
        repo.assert_nondirty().await?;

        tokio::fs::write(&readme, "version 1.2.4").await?;
        sim_assert_eq!(repo.dirty_files().await?, vec![readme.canonicalize()?]);
        assert!(repo.assert_nondirty().await.is_err());

        repo.add(&[&readme]).await?;
        repo.commit("bump version\n\nwith a body → unicode", &[]).await?;
        sim_assert_eq!(repo.dirty_files().await?, Vec::<PathBuf>::new());
        Ok(())
    }

    #[ignore = "requires git"]
    #[tokio::test]
    async fn dirty_files_are_relative_to_repository_root() -> eyre::Result<()> {
        crate::tests::init();
        let repo = temp::GitRepository::new().await?;
        let readme = repo.path().join("README.md");
        let nested = repo.path().join("nested");
        tokio::fs::create_dir(&nested).await?;
        tokio::fs::write(&readme, "version 1.2.3").await?;
        tokio::fs::write(nested.join("VERSION"), "1.2.3").await?;
        repo.add_untracked(&[&readme, &nested.join("VERSION")]).await?;
        repo.commit("initial commit", &[]).await?;

        tokio::fs::write(&readme, "version 1.2.4").await?;
        let subdir = super::GitRepository::open(nested.clone());
        sim_assert_eq!(subdir.dirty_files().await?, vec![readme.canonicalize()?]);
        Ok(())
    }

    #[ignore = "requires git"]
    #[tokio::test]
    async fn no_tag_info_without_tags() -> eyre::Result<()> {
        crate::tests::init();
        let repo = temp::GitRepository::new().await?;
        let tag_name = Template::parse("v{new_version}")?;
        sim_assert_eq!(repo.latest_tag_info(&tag_name).await?, None);
        Ok(())
    }
}
