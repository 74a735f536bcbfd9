#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod context;
pub mod files;
pub mod logging;
pub mod template;
pub mod vcs;
pub mod version;

use crate::{
    logging::{LogExt, Verbosity},
    vcs::{TagInfo, VersionControlSystem},
    version::Version,
};
use colored::Colorize;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BumpError {
    #[error("missing current version")]
    MissingCurrentVersion,
    #[error("no usable version control system found, unable to commit")]
    NoVcs,
    #[error("failed to bump version")]
    Bump(#[from] version::BumpError),
    #[error("failed to serialize version")]
    Serialize(#[from] version::SerializeError),
    #[error(transparent)]
    MissingTemplate(#[from] version::MissingTemplateError),
    #[error("failed to replace version")]
    Files(#[from] files::Error),
    #[error("failed to update config file")]
    Config(#[from] config::Error),
    #[error(transparent)]
    MissingKey(#[from] template::MissingKeyError),
    #[error(transparent)]
    Vcs(#[from] vcs::Error),
}

/// Versionbump manager
#[derive(Debug)]
pub struct BumpVersion<VCS, L> {
    /// The detected version control system, if any.
    pub repo: Option<VCS>,
    pub config: config::FinalizedConfig,
    pub logger: L,
    /// The latest version tag, if any.
    pub tag_info: Option<TagInfo>,
    /// Config file that is updated with the new version.
    pub config_file: Option<PathBuf>,
    /// Context for rendering versions, commit messages and tag names.
    pub context: context::Context,
}

impl<VCS, L> BumpVersion<VCS, L>
where
    VCS: VersionControlSystem,
    L: logging::Log,
{
    fn current_version(&self) -> Option<&str> {
        let tagged = self
            .tag_info
            .as_ref()
            .map(|tag_info| tag_info.current_version.as_str());
        match (self.config.current_version.as_deref(), tagged) {
            (Some(configured), Some(tagged)) => {
                if configured != tagged {
                    tracing::warn!(
                        configured,
                        tagged,
                        "configured current version differs from the latest tag"
                    );
                }
                Some(configured)
            }
            (configured, tagged) => configured.or(tagged),
        }
    }

    fn version_model(&self) -> Result<Version, BumpError> {
        let version = Version::new(
            self.config.parse_version_pattern.clone(),
            self.config.serialize_version_patterns.clone(),
            self.context.clone(),
        )?;
        Ok(version)
    }

    /// Bump `component` of the current version, or set the configured new version.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    /// - When there is no current version.
    /// - When the version cannot be bumped or serialized.
    /// - When the working directory is dirty.
    /// - When a file or the config file cannot be updated.
    /// - When committing or tagging fails.
    pub async fn bump(&self, component: Option<&str>) -> Result<String, BumpError> {
        let current_version_serialized = self
            .current_version()
            .ok_or(BumpError::MissingCurrentVersion)?
            .to_string();

        let mut current_version = self.version_model()?;
        // a version that does not match the pattern has no components and cannot be bumped
        let _ = current_version.parse(&current_version_serialized);
        self.logger.log_version(
            "current version",
            &current_version_serialized,
            Some(&current_version),
        );

        let (new_version, new_version_serialized) = match self.config.new_version.as_deref() {
            Some(new_version_serialized) => {
                tracing::info!(new_version = new_version_serialized, "using configured new version");
                let mut new_version = self.version_model()?;
                let _ = new_version.parse(new_version_serialized);
                (new_version, new_version_serialized.to_string())
            }
            None => {
                let mut new_version = current_version.clone();
                if let Some(component) = component {
                    tracing::info!(component, "attempting to increment version component");
                    if !new_version.bump(component)? {
                        tracing::warn!(
                            component,
                            "version has no component {component:?}, nothing was bumped"
                        );
                    }
                }
                let new_version_serialized = new_version.serialize()?;
                (new_version, new_version_serialized)
            }
        };
        tracing::info!(version = new_version_serialized, "next version");
        self.logger
            .log_version("new version", &new_version_serialized, Some(&new_version));

        if current_version_serialized == new_version_serialized {
            tracing::info!(
                version = new_version_serialized,
                "next version matches current version"
            );
            self.logger.log(
                Verbosity::Low,
                &format!("{}", "\tversion is unchanged".dimmed()),
            );
            return Ok(new_version_serialized);
        }

        let dry_run = self.config.dry_run;
        if dry_run {
            tracing::info!("dry run active, won't touch any files.");
        }

        if !self.config.allow_dirty {
            if let Some(repo) = &self.repo {
                repo.assert_nondirty().await?;
            }
        }

        let modifications = files::replace_version_in_files(
            &self.config.files,
            &current_version_serialized,
            &new_version_serialized,
            dry_run,
        )
        .await?;
        for modification in &modifications {
            self.logger.log(Verbosity::Low, "");
            self.logger.log_modification(modification);
        }

        let mut files_to_commit: Vec<PathBuf> = modifications
            .into_iter()
            .map(|modification| modification.path)
            .collect();

        if let Some(config_file) = &self.config_file {
            let modification =
                config::update_config_file(config_file, &new_version_serialized, dry_run).await?;
            self.logger.log(Verbosity::Low, "");
            self.logger.log_modification(&modification);
            files_to_commit.push(modification.path);
        }

        let ctx = context::with_versions(
            &self.context,
            Some(&current_version),
            Some(&new_version),
            &current_version_serialized,
            &new_version_serialized,
        );
        self.commit_changes(&files_to_commit, &ctx).await?;

        Ok(new_version_serialized)
    }

    /// Commit the changed files and tag the commit, if configured.
    ///
    /// # Errors
    /// When there is no version control system, or any command fails.
    pub async fn commit_changes(
        &self,
        files: &[PathBuf],
        ctx: &context::Context,
    ) -> Result<(), BumpError> {
        if !self.config.commit {
            return Ok(());
        }
        let repo = self.repo.as_ref().ok_or(BumpError::NoVcs)?;
        let dry_run = self.config.dry_run;

        let extra_args = self
            .config
            .commit_args
            .as_deref()
            .and_then(shlex::split)
            .unwrap_or_default();

        self.logger
            .log(Verbosity::Low, &format!("{}", "[commit]".magenta()));
        for path in files {
            self.logger.log(
                Verbosity::Low,
                &format!("\t{} {}", "   add".dimmed(), path.to_string_lossy().cyan()),
            );
        }

        let commit_message = self.config.commit_message.format(ctx, true)?;
        tracing::info!(msg = commit_message, "commit");
        self.logger.log(
            Verbosity::Low,
            &format!("\t{} {}", "commit".dimmed(), commit_message.cyan()),
        );

        if !dry_run {
            repo.add(files).await?;
            repo.commit(&commit_message, &extra_args).await?;
        }

        if self.config.tag {
            let tag_name = self.config.tag_name.format(ctx, true)?;
            tracing::info!(name = tag_name, "tag");
            self.logger
                .log(Verbosity::Low, &format!("{}", "[tag]".magenta()));
            self.logger.log(
                Verbosity::Low,
                &format!("\t{}{}", "tag = ".dimmed(), tag_name.yellow()),
            );
            if !dry_run {
                repo.tag(&tag_name).await?;
            }
        }
        Ok(())
    }
}
