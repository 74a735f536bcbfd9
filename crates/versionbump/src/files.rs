use futures::stream::{StreamExt, TryStreamExt};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};

/// Maximum number of files read or written at the same time.
const CONCURRENCY: usize = 8;

#[derive(thiserror::Error, Debug)]
#[error("io error for {path:?}")]
pub struct IoError {
    #[source]
    pub source: std::io::Error,
    pub path: PathBuf,
}

impl IoError {
    pub fn new(source: impl Into<std::io::Error>, path: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("did not find {version:?} in file {path:?}")]
    VersionNotFound { version: String, path: PathBuf },
}

/// The contents of a file before and after replacing the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Modification {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
}

impl Modification {
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.before != self.after
    }

    /// Unified diff of the change, if there is any.
    #[must_use]
    pub fn diff(&self) -> Option<String> {
        if !self.is_changed() {
            return None;
        }
        let label_existing = format!("{} (before)", self.path.display());
        let label_new = format!("{} (after)", self.path.display());
        let diff = similar_asserts::SimpleDiff::from_str(
            &self.before,
            &self.after,
            &label_existing,
            &label_new,
        );
        Some(diff.to_string())
    }
}

/// Replace every occurrence of `current_version` with `new_version`.
#[must_use]
pub fn replace_version(before: &str, current_version: &str, new_version: &str) -> String {
    before.replace(current_version, new_version)
}

async fn read_file(path: &Path) -> Result<String, Error> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| IoError::new(source, path))?;
    Ok(contents)
}

/// Check that a file exists and contains `version`.
///
/// # Errors
/// When the file cannot be read or does not contain `version`.
pub async fn check_contains_version(path: &Path, version: &str) -> Result<(), Error> {
    let contents = read_file(path).await?;
    if let Some(offset) = contents.find(version) {
        let line = contents[..offset].matches('\n').count() + 1;
        tracing::debug!(?path, line, version, "found current version");
        Ok(())
    } else {
        Err(Error::VersionNotFound {
            version: version.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Replace the version in a single file.
///
/// # Errors
/// When the file cannot be read or written.
pub async fn replace_version_in_file(
    path: &Path,
    current_version: &str,
    new_version: &str,
    dry_run: bool,
) -> Result<Modification, Error> {
    let before = read_file(path).await?;
    let after = replace_version(&before, current_version, new_version);
    if before == after {
        tracing::warn!(?path, "no change after version replacement");
    } else if !dry_run {
        tokio::fs::write(path, &after)
            .await
            .map_err(|source| IoError::new(source, path))?;
    }
    Ok(Modification {
        path: path.to_path_buf(),
        before,
        after,
    })
}

/// Replace the version in all files.
///
/// Every file is checked to contain `current_version` before any file is written.
/// Modifications are returned in order of their paths.
///
/// # Errors
/// When a file cannot be read or written, or does not contain `current_version`.
pub async fn replace_version_in_files(
    paths: &[PathBuf],
    current_version: &str,
    new_version: &str,
    dry_run: bool,
) -> Result<Vec<Modification>, Error> {
    let paths: IndexSet<&Path> = paths.iter().map(PathBuf::as_path).collect();

    futures::stream::iter(paths.iter())
        .map(|path| check_contains_version(path, current_version))
        .buffer_unordered(CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    let mut modifications: Vec<Modification> = futures::stream::iter(paths.iter())
        .map(|path| replace_version_in_file(path, current_version, new_version, dry_run))
        .buffer_unordered(CONCURRENCY)
        .try_collect()
        .await?;

    modifications.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(modifications)
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre;
    use similar_asserts::assert_eq as sim_assert_eq;

    #[test]
    fn replaces_all_occurrences() {
        crate::tests::init();
        sim_assert_eq!(
            super::replace_version("a 1.2.3 b 1.2.3\n1.2.30", "1.2.3", "1.3.0"),
            "a 1.3.0 b 1.3.0\n1.3.00"
        );
    }

    #[test]
    fn diff_only_for_changes() {
        crate::tests::init();
        let unchanged = super::Modification {
            path: "VERSION".into(),
            before: "1.0.0\n".to_string(),
            after: "1.0.0\n".to_string(),
        };
        assert!(unchanged.diff().is_none());

        let changed = super::Modification {
            after: "1.1.0\n".to_string(),
            ..unchanged
        };
        let diff = changed.diff().unwrap_or_default();
        assert!(diff.contains("1.1.0"), "{diff}");
        assert!(diff.contains("VERSION (after)"), "{diff}");
    }

    #[tokio::test]
    async fn no_file_is_written_if_one_misses_the_version() -> eyre::Result<()> {
        crate::tests::init();
        let dir = tempfile::tempdir()?;
        let good = dir.path().join("good.txt");
        let bad = dir.path().join("bad.txt");
        tokio::fs::write(&good, "version = 0.1.0\n").await?;
        tokio::fs::write(&bad, "no version here\n").await?;

        let err = super::replace_version_in_files(&[good.clone(), bad.clone()], "0.1.0", "0.2.0", false)
            .await
            .unwrap_err();
        assert!(
            matches!(err, super::Error::VersionNotFound { ref path, .. } if path == &bad),
            "{err:?}"
        );
        sim_assert_eq!(tokio::fs::read_to_string(&good).await?, "version = 0.1.0\n");
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_an_error() -> eyre::Result<()> {
        crate::tests::init();
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("missing.txt");
        let err = super::check_contains_version(&missing, "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, super::Error::Io(_)), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn rewrites_files_unless_dry_run() -> eyre::Result<()> {
        crate::tests::init();
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, "1.0.0").await?;
        tokio::fs::write(&b, "__version__ = '1.0.0'").await?;

        let modifications =
            super::replace_version_in_files(&[b.clone(), a.clone(), b.clone()], "1.0.0", "1.0.1", true)
                .await?;
        sim_assert_eq!(
            modifications.iter().map(|m| m.path.clone()).collect::<Vec<_>>(),
            vec![a.clone(), b.clone()]
        );
        sim_assert_eq!(tokio::fs::read_to_string(&a).await?, "1.0.0");

        super::replace_version_in_files(&[a.clone(), b.clone()], "1.0.0", "1.0.1", false).await?;
        sim_assert_eq!(tokio::fs::read_to_string(&a).await?, "1.0.1");
        sim_assert_eq!(
            tokio::fs::read_to_string(&b).await?,
            "__version__ = '1.0.1'"
        );
        Ok(())
    }
}
