use crate::{
    command::run_command,
    vcs::{git, hg},
};
use async_process::Command;
use color_eyre::eyre;
use std::path::Path;
use tempfile::TempDir;

async fn run_in(dir: &Path, program: &str, args: &[&str]) -> eyre::Result<()> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(dir);
    let _ = run_command(&mut cmd).await?;
    Ok(())
}

/// A git repository in a temporary directory that is removed on drop.
pub struct GitRepository {
    inner: git::GitRepository,
    dir: TempDir,
}

impl GitRepository {
    pub async fn new() -> eyre::Result<Self> {
        let dir = TempDir::with_prefix("versionbump-git-")?;
        run_in(dir.path(), "git", &["init"]).await?;
        run_in(dir.path(), "git", &["config", "user.email", "test@example.com"]).await?;
        run_in(dir.path(), "git", &["config", "user.name", "Test"]).await?;
        run_in(dir.path(), "git", &["config", "commit.gpgsign", "false"]).await?;
        let inner = git::GitRepository::open(dir.path());
        Ok(Self { inner, dir })
    }

    /// Start tracking new files.
    pub async fn add_untracked(&self, files: &[impl AsRef<Path>]) -> eyre::Result<()> {
        let files: Vec<String> = files
            .iter()
            .map(|f| f.as_ref().to_string_lossy().to_string())
            .collect();
        let mut args = vec!["add"];
        args.extend(files.iter().map(String::as_str));
        run_in(self.dir.path(), "git", &args).await
    }
}

impl std::ops::Deref for GitRepository {
    type Target = git::GitRepository;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A mercurial repository in a temporary directory that is removed on drop.
pub struct MercurialRepository {
    inner: hg::MercurialRepository,
    dir: TempDir,
}

impl MercurialRepository {
    pub async fn new() -> eyre::Result<Self> {
        let dir = TempDir::with_prefix("versionbump-hg-")?;
        run_in(dir.path(), "hg", &["init"]).await?;
        let inner = hg::MercurialRepository::open(dir.path());
        Ok(Self { inner, dir })
    }

    /// Start tracking new files.
    pub async fn add_untracked(&self, files: &[impl AsRef<Path>]) -> eyre::Result<()> {
        let files: Vec<String> = files
            .iter()
            .map(|f| f.as_ref().to_string_lossy().to_string())
            .collect();
        let mut args = vec!["add"];
        args.extend(files.iter().map(String::as_str));
        run_in(self.dir.path(), "hg", &args).await
    }
}

impl std::ops::Deref for MercurialRepository {
    type Target = hg::MercurialRepository;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
