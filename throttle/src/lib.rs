//! Resource limits for the mirroring core
//!
//! The walker fans out one task per directory entry, so for large trees the number of
//! concurrently issued filesystem requests has to be bounded explicitly. This crate keeps
//! those bounds in process-wide semaphores.
//!
//! # Overview
//!
//! 1. **Open Files Limit** - maximum number of files held open by concurrent copies
//! 2. **In-flight Operations Limit** - maximum number of outstanding filesystem requests
//!    (directory listings, stat calls, directory creation)
//! 3. **Operations Throttle** - token bucket limiting directory entries processed per interval
//!
//! Every limit is disabled until configured with a non-zero value.
//!
//! # Usage
//!
//! ```rust,no_run
//! use throttle::{fs_op_permit, open_file_permit, set_max_in_flight_ops, set_max_open_files};
//!
//! # async fn example() {
//! set_max_open_files(8000);
//! set_max_in_flight_ops(256);
//!
//! {
//!     let _permit = fs_op_permit().await;
//!     // stat / list / mkdir here
//! }
//! let _guard = open_file_permit().await;
//! // copy the file here - permit is released when the guard is dropped
//! # }
//! ```
//!
//! ## Operations Throttling
//!
//! ```rust,no_run
//! use throttle::{get_ops_token, init_ops_tokens, run_ops_replenish_thread};
//! use std::time::Duration;
//!
//! # async fn example() {
//! // 10 tokens / 100ms = 100 entries per second
//! init_ops_tokens(10);
//! tokio::spawn(run_ops_replenish_thread(10, Duration::from_millis(100)));
//! get_ops_token().await;
//! # }
//! ```
//!
//! # Deadlock freedom
//!
//! Permits from [`fs_op_permit`] must only be held around a single request and never while
//! awaiting child tasks; a parent directory waiting on its children with a permit in hand
//! could otherwise starve them.

mod semaphore;

static OPEN_FILES_LIMIT: std::sync::LazyLock<semaphore::Semaphore> =
    std::sync::LazyLock::new(semaphore::Semaphore::new);
static IN_FLIGHT_LIMIT: std::sync::LazyLock<semaphore::Semaphore> =
    std::sync::LazyLock::new(semaphore::Semaphore::new);
static OPS_THROTTLE: std::sync::LazyLock<semaphore::Semaphore> =
    std::sync::LazyLock::new(semaphore::Semaphore::new);

pub fn set_max_open_files(max_open_files: usize) {
    tracing::debug!("max open files: {}", max_open_files);
    OPEN_FILES_LIMIT.setup(max_open_files);
}

pub struct OpenFileGuard {
    _permit: Option<tokio::sync::SemaphorePermit<'static>>,
}

pub async fn open_file_permit() -> OpenFileGuard {
    OpenFileGuard {
        _permit: OPEN_FILES_LIMIT.acquire().await,
    }
}

pub fn set_max_in_flight_ops(max_in_flight: usize) {
    tracing::debug!("max in-flight filesystem operations: {}", max_in_flight);
    IN_FLIGHT_LIMIT.setup(max_in_flight);
}

/// Held for the duration of one filesystem request.
pub struct FsOpGuard {
    _permit: Option<tokio::sync::SemaphorePermit<'static>>,
}

pub async fn fs_op_permit() -> FsOpGuard {
    FsOpGuard {
        _permit: IN_FLIGHT_LIMIT.acquire().await,
    }
}

pub fn init_ops_tokens(ops_tokens: usize) {
    OPS_THROTTLE.setup(ops_tokens);
}

pub async fn get_ops_token() {
    OPS_THROTTLE.consume().await;
}

pub async fn run_ops_replenish_thread(replenish: usize, interval: std::time::Duration) {
    OPS_THROTTLE.run_replenish_thread(replenish, interval).await;
}
