use crate::summary::Summary;

/// The filesystem request that failed, with the path it was issued against.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("cannot list directory {path:?}")]
    List {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot inspect {path:?}")]
    Stat {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot create directory {path:?}")]
    Mkdir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot copy {src:?} to {dst:?}")]
    Copy {
        src: std::path::PathBuf,
        dst: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Failure {
    pub fn list(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::List {
            path: path.to_owned(),
            source,
        }
    }

    pub fn stat(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Stat {
            path: path.to_owned(),
            source,
        }
    }

    pub fn mkdir(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Mkdir {
            path: path.to_owned(),
            source,
        }
    }
}

/// Error type for mirror operations that preserves the work summary even on failure.
///
/// # Logging Convention
/// The Display implementation shows the full error chain, so any format specifier works:
/// ```ignore
/// tracing::error!("mirror failed: {}", &error);
/// tracing::error!("mirror failed: {:#}", &error);
/// ```
///
/// The [`Failure`] behind the error can be recovered with `error.failure()`. When several
/// entries failed this is the first one reported; configuration errors have none.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.source.downcast_ref::<Failure>()
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        Error::new(failure.into(), Summary::default())
    }
}
