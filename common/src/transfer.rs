use async_recursion::async_recursion;
use tracing::instrument;

use crate::error::{Error, Failure};
use crate::summary::Summary;

#[derive(Debug, Copy, Clone)]
pub struct Settings {
    /// Print `copied: <name>` to stdout after every successful copy
    pub notify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { notify: true }
    }
}

/// State of a destination directory right before a file is copied into it.
///
/// Any outcome other than these two is a [`Failure::Stat`]; in particular an inaccessible
/// directory is never treated as present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DestinationStatus {
    Exists,
    NotFound,
}

#[instrument]
pub async fn probe_destination(dir: &std::path::Path) -> Result<DestinationStatus, Failure> {
    let _permit = throttle::fs_op_permit().await;
    match tokio::fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => Ok(DestinationStatus::Exists),
        Ok(metadata) => Err(Failure::stat(
            dir,
            std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("destination is not a directory: {:?}", metadata.file_type()),
            ),
        )),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Ok(DestinationStatus::NotFound)
        }
        Err(error) => Err(Failure::stat(dir, error)),
    }
}

/// Creates `dir` along with any missing ancestors.
///
/// Siblings racing to create the same directory are expected; finding the directory already
/// in place is success. Returns how many directories this call created, ancestors included,
/// so that every directory is counted by exactly one caller.
#[instrument]
#[async_recursion]
pub async fn materialize_dir(dir: &std::path::Path) -> Result<usize, Failure> {
    let mut created = 0;
    let mut ancestors_ready = false;
    loop {
        let result = {
            let _permit = throttle::fs_op_permit().await;
            tokio::fs::create_dir(dir).await
        };
        match result {
            Ok(()) => return Ok(created + 1),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                let metadata = tokio::fs::metadata(dir)
                    .await
                    .map_err(|error| Failure::stat(dir, error))?;
                if metadata.is_dir() {
                    tracing::debug!("directory was created concurrently");
                    return Ok(created);
                }
                return Err(Failure::mkdir(dir, error));
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound && !ancestors_ready => {
                // the permit is released by now, recursing while holding it could starve
                if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
                    created += materialize_dir(parent).await?;
                }
                ancestors_ready = true;
            }
            Err(error) => return Err(Failure::mkdir(dir, error)),
        }
    }
}

/// Copies `src_dir/name` to `dst_dir/name`, materializing `dst_dir` first if it is missing.
///
/// An existing destination file is overwritten. Nothing is verified after the copy.
#[instrument(skip(settings))]
pub async fn transfer(
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    name: &std::ffi::OsStr,
    settings: &Settings,
) -> Result<Summary, Error> {
    let src = src_dir.join(name);
    let dst = dst_dir.join(name);
    let mut summary = Summary::default();
    match probe_destination(dst_dir).await? {
        DestinationStatus::Exists => {}
        DestinationStatus::NotFound => {
            tracing::debug!("destination directory is missing");
            summary.directories_created += materialize_dir(dst_dir).await?;
        }
    }
    tracing::debug!("copying data");
    let result = {
        let _open_file_guard = throttle::open_file_permit().await;
        tokio::fs::copy(&src, &dst).await
    };
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(source) => {
            return Err(Error::new(
                Failure::Copy { src, dst, source }.into(),
                summary,
            ));
        }
    };
    summary.files_copied += 1;
    summary.bytes_copied += bytes;
    tracing::info!("copied {:?} -> {:?}", &src, &dst);
    if settings.notify {
        notify_copied(&mut std::io::stdout().lock(), name);
    }
    Ok(summary)
}

/// Reports a finished copy; a closed stdout only costs the notification, never the copy.
fn notify_copied(out: &mut impl std::io::Write, name: &std::ffi::OsStr) {
    if let Err(error) = writeln!(out, "copied: {}", name.to_string_lossy()) {
        tracing::warn!("failed reporting copy of {:?}: {}", name, error);
    }
}
