//! User-facing progress output, filtered by verbosity.
use crate::{files::Modification, version::Version};
use colored::{Color, Colorize};

/// Controls level of detail emitted by loggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Verbosity {
    /// No logs will be emitted.
    Off = 0,
    /// Current and new version and the changed files.
    Low = 1,
    /// Diffs and the parsed version components.
    Medium = 2,
    High = 3,
}

impl From<u8> for Verbosity {
    fn from(value: u8) -> Self {
        match value {
            0 => Verbosity::Off,
            1 => Verbosity::Low,
            2 => Verbosity::Medium,
            _ => Verbosity::High,
        }
    }
}

pub trait Log {
    /// Log a message if `verbosity` is within the configured level.
    fn log(&self, verbosity: Verbosity, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoOpLogger {}

impl Log for NoOpLogger {
    fn log(&self, _: Verbosity, _: &str) {}
}

pub trait LogExt {
    /// Log a file modification with its diff.
    fn log_modification(&self, modification: &Modification);

    /// Log a headline followed by a version and its components.
    fn log_version(&self, headline: &str, serialized: &str, version: Option<&Version>);
}

impl<T> LogExt for T
where
    T: Log,
{
    fn log_modification(&self, modification: &Modification) {
        self.log(
            Verbosity::Low,
            &format!(
                "{}",
                format!("[{}]", modification.path.to_string_lossy()).magenta()
            ),
        );
        let Some(diff) = modification.diff() else {
            self.log(Verbosity::Low, &format!("{}", "\tno changes".dimmed()));
            return;
        };
        self.log(Verbosity::Low, "\tmodified");
        for line in diff.lines() {
            let mut line = format!("\t{line}");
            line.push_str("\x1b[0;0m"); // reset all styles at end of line
            self.log(Verbosity::Medium, &line);
        }
    }

    fn log_version(&self, headline: &str, serialized: &str, version: Option<&Version>) {
        self.log(
            Verbosity::Low,
            &format!("{}", format!("[{headline}]").blue()),
        );
        self.log(
            Verbosity::Low,
            &format!("\t{}", serialized.yellow().bold()),
        );
        if let Some(version) = version {
            self.log(
                Verbosity::Medium,
                &format!("\t{}", format_version(version, Color::Cyan)),
            );
        }
    }
}

pub(crate) fn format_version(version: &Version, color: Color) -> String {
    version
        .iter()
        .map(|(name, component)| format!("{}={}", name.color(color), component.value()))
        .collect::<Vec<_>>()
        .join("  ")
}
