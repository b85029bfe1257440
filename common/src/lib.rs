//! Core of the `rmirror` tool: one-way, copy-only mirroring of directory trees
//!
//! A run is described by a [`MirrorConfig`], a fixed table of [`MirrorTask`]s. Every task
//! walks its source tree and copies files into the matching place under its destination,
//! creating destination directories on demand. Filtered tasks copy only entries whose name
//! matches the [`filter::NameFilter`].
//!
//! # Concurrency
//!
//! All tasks start at once. Inside a task every directory entry is handled by its own tokio
//! task and parents wait for their children, so [`mirror`] returns only after everything
//! finished. The number of outstanding filesystem requests can be capped through
//! [`ThrottleConfig`].
//!
//! # What it does not do
//!
//! Destination files are always overwritten, never compared first. Files that disappeared from
//! the source are left in place at the destination.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), common::Error> {
//! let config = common::MirrorConfig::new(vec![
//!     common::MirrorTask::new("/repos/app/src", "/mirror/app/src", true),
//!     common::MirrorTask::new("/repos/app/tests", "/mirror/app/tests", false),
//! ]);
//! let summary = common::mirror(&config, &common::Settings::default()).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

use anyhow::anyhow;
use tracing::instrument;

pub mod config;
pub mod error;
pub mod filter;
pub mod summary;
pub mod transfer;
pub mod walk;

#[cfg(test)]
mod testutils;

pub use config::{MirrorConfig, MirrorTask, OutputConfig, RuntimeConfig, ThrottleConfig};
pub use error::{Error, Failure};
pub use summary::Summary;
pub use transfer::transfer;
pub use walk::walk;

#[derive(Debug, Copy, Clone, Default)]
pub struct Settings {
    pub fail_early: bool,
    pub transfer: transfer::Settings,
}

/// Runs every task of `config` concurrently and waits for all of them.
///
/// A failing task does not stop the others unless `fail_early` is set. The error returned
/// after a partial failure carries the combined summary of all tasks.
#[instrument(skip(config, settings))]
pub async fn mirror(config: &MirrorConfig, settings: &Settings) -> Result<Summary, Error> {
    config
        .validate()
        .map_err(|err| Error::new(err, Summary::default()))?;
    let filter = config
        .name_filter()
        .map_err(|err| Error::new(err, Summary::default()))?;
    let mut join_set = tokio::task::JoinSet::new();
    for task in &config.tasks {
        let walk_settings = walk::Settings {
            filter: task.filtered.then(|| filter.clone()),
            policy: task.policy(),
            fail_early: settings.fail_early,
            transfer: settings.transfer,
        };
        let task = task.clone();
        let do_walk = || async move {
            tracing::info!("mirror: {:?} -> {:?}", &task.source, &task.destination);
            let result = walk::walk(&task.source, &task.destination, &walk_settings).await;
            (task, result)
        };
        join_set.spawn(do_walk());
    }
    let mut mirror_summary = Summary::default();
    let mut first_error = None;
    let mut failed = 0;
    while let Some(res) = join_set.join_next().await {
        let error = match res {
            Ok((_, Ok(summary))) => {
                mirror_summary = mirror_summary + summary;
                continue;
            }
            Ok((task, Err(error))) => {
                tracing::error!(
                    "mirror: {:?} -> {:?} failed with: {:#}",
                    &task.source,
                    &task.destination,
                    &error
                );
                mirror_summary = mirror_summary + error.summary;
                error.source
            }
            Err(error) => {
                tracing::error!("mirror task did not complete: {:#}", &error);
                error.into()
            }
        };
        if settings.fail_early {
            return Err(Error::new(error, mirror_summary));
        }
        failed += 1;
        first_error.get_or_insert(error);
    }
    match first_error {
        None => Ok(mirror_summary),
        Some(error) => Err(Error::new(
            error.context(format!(
                "mirror: {} of {} tasks failed",
                failed,
                config.tasks.len()
            )),
            mirror_summary,
        )),
    }
}

fn init_tracing(output: &OutputConfig) -> Result<(), anyhow::Error> {
    use tracing_subscriber::filter::LevelFilter;
    let level = if output.quiet {
        LevelFilter::OFF
    } else {
        match output.verbose {
            0 => LevelFilter::ERROR,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    // stdout is reserved for copy notifications and the summary
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

/// 80% of the soft `RLIMIT_NOFILE`, leaving room for descriptors not used for copying.
fn default_max_open_files() -> usize {
    match nix::sys::resource::getrlimit(nix::sys::resource::Resource::RLIMIT_NOFILE) {
        Ok((soft, _hard)) => usize::try_from(soft / 10 * 8).unwrap_or(usize::MAX),
        Err(error) => {
            tracing::warn!("failed reading open files limit, not limiting: {error}");
            0
        }
    }
}

/// Splits a per-second rate into (tokens, interval) so the bucket refills smoothly.
fn ops_replenish_schedule(per_second: usize) -> (usize, std::time::Duration) {
    let (tokens, remainder) = (per_second / 10, per_second % 10);
    if tokens > 0 && remainder == 0 {
        (tokens, std::time::Duration::from_millis(100))
    } else {
        (per_second, std::time::Duration::from_secs(1))
    }
}

/// Sets up logging, limits and the tokio runtime, then drives `func` to completion.
///
/// Returns `None` if anything failed; the error has already been printed (unless quiet).
pub fn run<Fut, T, E>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    throttle_config: ThrottleConfig,
    func: impl FnOnce() -> Fut,
) -> Option<T>
where
    T: std::fmt::Display,
    E: std::fmt::Display,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    if let Err(error) = init_tracing(&output) {
        eprintln!("{error:#}");
    }
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let tokio_runtime = match builder.build() {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => {
            if !output.quiet {
                eprintln!("failed to start the tokio runtime: {error}");
            }
            return None;
        }
    };
    throttle::set_max_open_files(
        throttle_config
            .max_open_files
            .unwrap_or_else(default_max_open_files),
    );
    throttle::set_max_in_flight_ops(throttle_config.max_in_flight);
    let res = tokio_runtime.block_on(async move {
        if throttle_config.ops_throttle > 0 {
            let (replenish, interval) = ops_replenish_schedule(throttle_config.ops_throttle);
            throttle::init_ops_tokens(replenish);
            tokio::spawn(throttle::run_ops_replenish_thread(replenish, interval));
        }
        func().await
    });
    match res {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                use std::io::Write;
                if let Err(error) = writeln!(std::io::stdout().lock(), "{summary}") {
                    tracing::warn!("failed printing summary: {error}");
                }
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}
