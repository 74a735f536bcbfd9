use crate::{
    command::run_command,
    template::Template,
    vcs::{parse_status_lines, Error, TagInfo, VersionControlSystem},
};
use async_process::Command;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MercurialRepository {
    path: PathBuf,
}

impl MercurialRepository {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("hg");
        cmd.current_dir(&self.path).env("HGENCODING", "utf-8");
        cmd
    }

    /// The root directory of the repository.
    async fn root(&self) -> Result<PathBuf, Error> {
        let mut cmd = self.command();
        cmd.arg("root");
        let output = run_command(&mut cmd).await?;
        Ok(PathBuf::from(output.stdout.trim()))
    }
}

impl VersionControlSystem for MercurialRepository {
    const NAME: &'static str = "mercurial";

    fn path(&self) -> &Path {
        &self.path
    }

    async fn is_usable(&self) -> bool {
        let mut cmd = self.command();
        cmd.arg("root");
        match run_command(&mut cmd).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("mercurial is not usable: {err}");
                false
            }
        }
    }

    /// Tag information is not read from mercurial.
    async fn latest_tag_info(&self, _tag_name: &Template) -> Result<Option<TagInfo>, Error> {
        Ok(None)
    }

    async fn dirty_files(&self) -> Result<Vec<PathBuf>, Error> {
        // modified, added, removed and deleted files
        let mut cmd = self.command();
        cmd.args(["status", "-mard"]);
        let output = run_command(&mut cmd).await?;
        let root = self.root().await?;
        Ok(parse_status_lines(&root, &output.stdout))
    }

    /// Mercurial commits all modified tracked files, so there is nothing to stage.
    async fn add(&self, _files: &[impl AsRef<Path>]) -> Result<(), Error> {
        Ok(())
    }

    async fn commit(&self, message: &str, extra_args: &[String]) -> Result<(), Error> {
        let mut cmd = self.command();
        cmd.args(["commit", "-m", message]).args(extra_args);
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
    use crate::{
        template::Template,
        vcs::{temp, VersionControlSystem},
    };
    use color_eyre::eyre;
    use similar_asserts::assert_eq as sim_assert_eq;

    #[tokio::test]
    async fn missing_repository_is_not_usable() -> eyre::Result<()> {
        crate::tests::init();
        let dir = tempfile::tempdir()?;
        let repo = super::MercurialRepository::open(dir.path());
        assert!(!repo.is_usable().await);
        Ok(())
    }

    #[ignore = "requires mercurial"]
    #[tokio::test]
    async fn commit_and_tag() -> eyre::Result<()> {
        crate::tests::init();
        let repo = temp::MercurialRepository::new().await?;
        assert!(repo.is_usable().await);

        let file = repo.path().join("VERSION");
        tokio::fs::write(&file, "1.0.0").await?;
        repo.add_untracked(&[&file]).await?;
        sim_assert_eq!(repo.dirty_files().await?, vec![file.canonicalize()?]);

        repo.add(&[&file]).await?;
        repo.commit("Bump version: 0.9.0 → 1.0.0", &[]).await?;
        repo.tag("v1.0.0").await?;
        repo.assert_nondirty().await?;

        let tag_name = Template::parse("v{new_version}")?;
        sim_assert_eq!(repo.latest_tag_info(&tag_name).await?, None);
        Ok(())
    }
}
