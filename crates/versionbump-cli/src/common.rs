use crate::options;
use color_eyre::eyre::{self, WrapErr};
use std::path::{Path, PathBuf};
use versionbump::{
    config::{self, Config, MergeWith},
    context,
    template::Template,
    vcs::{Backend, TagInfo, VersionControlSystem},
};

/// Resolve the config file to read.
///
/// An explicitly given config file must exist, the default one is optional.
fn config_file_path(dir: &Path, explicit: Option<&Path>) -> eyre::Result<Option<PathBuf>> {
    match explicit {
        Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(eyre::eyre!("could not read config file at {path:?}")),
        None => {
            let path = dir.join(config::CONFIG_FILE);
            Ok(path.is_file().then_some(path))
        }
    }
}

async fn latest_tag_info(repo: Option<&Backend>, tag_name: &str) -> Option<TagInfo> {
    let repo = repo?;
    let tag_name = match Template::parse(tag_name) {
        Ok(tag_name) => tag_name,
        Err(err) => {
            tracing::warn!("{err}");
            return None;
        }
    };
    match repo.latest_tag_info(&tag_name).await {
        Ok(tag_info) => tag_info,
        Err(err) => {
            tracing::warn!("failed to read latest tag: {err}");
            None
        }
    }
}

fn absolute(dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        dir.join(path)
    }
}

pub async fn versionbump(options: options::Options) -> eyre::Result<()> {
    let start = std::time::Instant::now();

    let cwd = std::env::current_dir().wrap_err("could not determine current working dir")?;
    let dir = options
        .dir
        .as_deref()
        .unwrap_or(&cwd)
        .canonicalize()
        .wrap_err("could not resolve working dir")?;

    let repo = Backend::detect(&dir).await;
    if let Some(repo) = &repo {
        tracing::debug!(vcs = repo.name(), path = ?repo.path(), "detected version control");
    }

    let config_file = config_file_path(&dir, options.config_file.as_deref())?;
    let file_config = match &config_file {
        Some(path) => Config::from_file(path)
            .await
            .wrap_err_with(|| format!("failed to load config file {path:?}"))?,
        None => Config::empty(),
    };

    let mut config = options::cli_config(&options);
    config.merge_with(&file_config);

    let tag_name = config
        .tag_name
        .as_deref()
        .unwrap_or(config::DEFAULT_TAG_NAME);
    let tag_info = latest_tag_info(repo.as_ref(), tag_name).await;
    tracing::debug!(?tag_info, "latest tag");
    if let Some(tag_info) = &tag_info {
        config.merge_with(&Config::from_tag_info(tag_info));
    }

    let mut config = config.finalize()?;
    config.files = config
        .files
        .into_iter()
        .map(|file| absolute(&dir, file))
        .collect();

    if options.part.is_none() && config.new_version.is_none() {
        eyre::bail!("missing version component to bump");
    }

    let context = context::base_context(tag_info.as_ref());
    let logger = crate::verbose::Logger::new(options.verbosity.into());
    let manager = versionbump::BumpVersion {
        repo,
        config,
        logger,
        tag_info,
        config_file,
        context,
    };
    let new_version = manager.bump(options.part.as_deref()).await?;

    tracing::info!(version = new_version, elapsed = ?start.elapsed(), "done");
    Ok(())
}
