//! Context entries available to version, commit message and tag templates.
//!
//! The context is assembled once per run and handed to the version model, so rendering
//! never reads the clock or the environment on its own.
use crate::{vcs::TagInfo, version::Version};
use std::collections::HashMap;

/// A mapping of template names to their string values.
pub type Context = HashMap<String, String>;

/// Timestamps for `now` (local time) and `utcnow`, in RFC 3339.
pub fn time_context(
    now: chrono::DateTime<chrono::Utc>,
) -> impl Iterator<Item = (String, String)> {
    [
        (
            "now".to_string(),
            now.with_timezone(&chrono::Local).to_rfc3339(),
        ),
        ("utcnow".to_string(), now.to_rfc3339()),
    ]
    .into_iter()
}

/// Environment variables with keys prefixed with `$`.
pub fn prefixed_env<I, K, V>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: std::fmt::Display,
    V: Into<String>,
{
    vars.into_iter().map(|(k, v)| (format!("${k}"), v.into()))
}

/// Information about the latest tag, if there is any.
pub fn vcs_context(tag: Option<&TagInfo>) -> impl Iterator<Item = (String, String)> + '_ {
    tag.into_iter()
        .flat_map(|tag| {
            [
                ("current_version", tag.current_version.clone()),
                ("current_tag", tag.current_tag.clone()),
                ("commit_sha", tag.commit_sha.clone()),
                (
                    "distance_to_latest_tag",
                    tag.distance_to_latest_tag.to_string(),
                ),
                ("dirty", tag.dirty.to_string()),
            ]
        })
        .map(|(k, v)| (k.to_string(), v))
}

/// The context used when rendering versions.
#[must_use]
pub fn base_context(tag: Option<&TagInfo>) -> Context {
    time_context(chrono::Utc::now())
        .chain(prefixed_env(std::env::vars()))
        .chain(vcs_context(tag))
        .collect()
}

/// Extend `base` with the serialized versions and their components for commit messages and tags.
#[must_use]
pub fn with_versions(
    base: &Context,
    current_version: Option<&Version>,
    new_version: Option<&Version>,
    current_version_serialized: &str,
    new_version_serialized: &str,
) -> Context {
    let components = |prefix: &'static str, version: Option<&Version>| {
        version
            .into_iter()
            .flat_map(|version| version.iter())
            .map(move |(name, component)| {
                (
                    format!("{prefix}_{name}"),
                    component.effective_value().to_string(),
                )
            })
            .collect::<Vec<_>>()
    };

    base.clone()
        .into_iter()
        .chain([
            (
                "current_version".to_string(),
                current_version_serialized.to_string(),
            ),
            ("new_version".to_string(), new_version_serialized.to_string()),
        ])
        .chain(components("current", current_version))
        .chain(components("new", new_version))
        .collect()
}
