use async_recursion::async_recursion;
use tracing::instrument;

use crate::error::{Error, Failure};
use crate::filter::{Decision, FilterPolicy, NameFilter};
use crate::summary::Summary;
use crate::transfer;

#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Set for filtered tasks; only entries accepted by the filter are mirrored.
    pub filter: Option<NameFilter>,
    pub policy: FilterPolicy,
    pub fail_early: bool,
    pub transfer: transfer::Settings,
}

impl Settings {
    fn decide(&self, name: &std::ffi::OsStr, is_dir: bool) -> Decision {
        match &self.filter {
            Some(filter) => self.policy.decide(filter, name, is_dir),
            None if is_dir => Decision::Descend,
            None => Decision::Transfer,
        }
    }
}

async fn list_dir(dir: &std::path::Path) -> Result<Vec<std::ffi::OsString>, Failure> {
    let _permit = throttle::fs_op_permit().await;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|error| Failure::list(dir, error))?;
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|error| Failure::list(dir, error))?
    {
        names.push(entry.file_name());
    }
    Ok(names)
}

async fn visit(
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    name: &std::ffi::OsStr,
    settings: &Settings,
) -> Result<Summary, Error> {
    let src = src_dir.join(name);
    let metadata = {
        let _permit = throttle::fs_op_permit().await;
        tokio::fs::metadata(&src)
            .await
            .map_err(|error| Failure::stat(&src, error))?
    };
    match settings.decide(name, metadata.is_dir()) {
        Decision::Descend => walk(&src, &dst_dir.join(name), settings).await,
        Decision::Transfer => transfer::transfer(src_dir, dst_dir, name, &settings.transfer).await,
        Decision::Skip => {
            tracing::debug!("filter rejected {:?}", &src);
            Ok(Summary {
                entries_skipped: 1,
                ..Default::default()
            })
        }
    }
}

/// Mirrors the contents of `src_dir` into `dst_dir`.
///
/// Every entry is processed in its own task and this call returns only once all of them
/// finished. `dst_dir` is not created here; it is materialized by the first file copied into
/// it, so directories without any copied file never appear at the destination.
///
/// Without `fail_early` a failed entry does not stop its siblings. The returned error then
/// carries the summary of everything that did get mirrored and wraps the first failure.
#[instrument(skip(settings))]
#[async_recursion]
pub async fn walk(
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    settings: &Settings,
) -> Result<Summary, Error> {
    tracing::debug!("listing source directory");
    let names = list_dir(src_dir).await?;
    let mut walk_summary = Summary {
        directories_walked: 1,
        ..Default::default()
    };
    let mut join_set = tokio::task::JoinSet::new();
    for name in names {
        // rate-limits the stat calls issued for each entry
        throttle::get_ops_token().await;
        if settings
            .filter
            .as_ref()
            .is_some_and(|filter| settings.policy.rejects_by_name(filter, &name))
        {
            tracing::debug!("filter rejected {:?}", &name);
            walk_summary.entries_skipped += 1;
            continue;
        }
        let src_dir = src_dir.to_owned();
        let dst_dir = dst_dir.to_owned();
        let settings = settings.clone();
        let do_visit = || async move { visit(&src_dir, &dst_dir, &name, &settings).await };
        join_set.spawn(do_visit());
    }
    let mut first_error = None;
    let mut failed = 0;
    while let Some(res) = join_set.join_next().await {
        let error = match res {
            Ok(Ok(summary)) => {
                walk_summary = walk_summary + summary;
                continue;
            }
            Ok(Err(error)) => {
                walk_summary = walk_summary + error.summary;
                error.source
            }
            Err(error) => error.into(),
        };
        tracing::debug!("walk: {:?} -> {:?} entry failed with: {:#}", src_dir, dst_dir, &error);
        if settings.fail_early {
            return Err(Error::new(error, walk_summary));
        }
        failed += 1;
        first_error.get_or_insert(error);
    }
    match first_error {
        None => Ok(walk_summary),
        Some(error) => Err(Error::new(
            error.context(format!(
                "walk: {src_dir:?} -> {dst_dir:?} failed for {failed} entries"
            )),
            walk_summary,
        )),
    }
}
