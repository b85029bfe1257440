//! Configuration types for mirror tasks and runtime settings
//!
//! A task table is a TOML document with one `[[task]]` table per mirror task:
//!
//! ```toml
//! # optional, defaults to common::filter::DEFAULT_PATTERN
//! filter-pattern = '^fl_\w*\.(h|cpp)$'
//!
//! [[task]]
//! source = "/home/me/repos/project/src"
//! destination = "/srv/mirror/project/src"
//! filtered = true
//!
//! [[task]]
//! source = "/home/me/repos/project/tests"
//! destination = "/srv/mirror/project/tests"
//! ```

use anyhow::{Context, anyhow};

use crate::filter::{FilterPolicy, NameFilter};

/// One (source, destination, filter) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MirrorTask {
    pub source: std::path::PathBuf,
    pub destination: std::path::PathBuf,
    #[serde(default)]
    pub filtered: bool,
    #[serde(default)]
    pub filter_applies_to_files_only: bool,
}

impl MirrorTask {
    pub fn new(
        source: impl Into<std::path::PathBuf>,
        destination: impl Into<std::path::PathBuf>,
        filtered: bool,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            filtered,
            filter_applies_to_files_only: false,
        }
    }

    pub fn policy(&self) -> FilterPolicy {
        FilterPolicy {
            filter_applies_to_files_only: self.filter_applies_to_files_only,
        }
    }
}

/// The full task table, fixed for the duration of a run.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MirrorConfig {
    #[serde(default)]
    pub filter_pattern: Option<String>,
    #[serde(default, rename = "task")]
    pub tasks: Vec<MirrorTask>,
}

impl MirrorConfig {
    pub fn new(tasks: Vec<MirrorTask>) -> Self {
        Self {
            filter_pattern: None,
            tasks,
        }
    }

    pub fn parse(text: &str) -> Result<Self, anyhow::Error> {
        let config: Self = toml::from_str(text).context("invalid task table")?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, anyhow::Error> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading task table {path:?}"))?;
        Self::parse(&text).with_context(|| format!("failed parsing task table {path:?}"))
    }

    pub fn name_filter(&self) -> Result<NameFilter, anyhow::Error> {
        match &self.filter_pattern {
            Some(pattern) => NameFilter::new(pattern),
            None => Ok(NameFilter::default()),
        }
    }

    /// Checks that tasks can run concurrently without coordination: no task writes into a
    /// tree another task (or itself) reads from.
    ///
    /// Paths are made absolute and `.`/`..` are resolved lexically before comparing, so
    /// `src` -> `./src/out` is caught just like `src` -> `src/out`. Symlinks are not resolved.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.tasks.is_empty() {
            return Err(anyhow!("no mirror tasks configured"));
        }
        self.name_filter()?;
        let resolved = self
            .tasks
            .iter()
            .map(|task| Ok((normalize(&task.source)?, normalize(&task.destination)?)))
            .collect::<Result<Vec<_>, anyhow::Error>>()?;
        for (i, (writer, (_, writer_dst))) in self.tasks.iter().zip(&resolved).enumerate() {
            for (j, (reader, (reader_src, _))) in self.tasks.iter().zip(&resolved).enumerate() {
                if writer_dst.starts_with(reader_src) {
                    return Err(anyhow!(
                        "destination {:?} of task #{} lies inside source {:?} of task #{}",
                        writer.destination,
                        i + 1,
                        reader.source,
                        j + 1
                    ));
                }
                if reader_src.starts_with(writer_dst) {
                    return Err(anyhow!(
                        "source {:?} of task #{} lies inside destination {:?} of task #{}",
                        reader.source,
                        j + 1,
                        writer.destination,
                        i + 1
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` components folded away.
fn normalize(path: &std::path::Path) -> Result<std::path::PathBuf, anyhow::Error> {
    use std::path::Component;
    let absolute =
        std::path::absolute(path).with_context(|| format!("cannot resolve path {path:?}"))?;
    let mut normalized = std::path::PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Throttling configuration for resource control
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleConfig {
    /// Maximum number of open files (None = 80% of system limit, 0 = no limit)
    pub max_open_files: Option<usize>,
    /// Maximum number of outstanding filesystem requests (0 = no limit)
    pub max_in_flight: usize,
    /// Directory entries processed per second (0 = no throttle)
    pub ops_throttle: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}
