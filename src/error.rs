use std::path::PathBuf;

/// Errors that may be encountered while configuring or running a simulation.
///
/// The [`InvalidParameter`] variant is raised while building the simulation's inputs, before any random draws are
/// made or any voter is queued. The recurrence itself cannot fail once its inputs have been accepted.
///
/// The [`Io`] variant originates from the [`report`] module and carries the path that could not be written. Output
/// files are persisted atomically, so a failed write leaves no partial file behind and does not affect files written
/// for other sweep cells.
///
/// [`InvalidParameter`]: Error::InvalidParameter
/// [`Io`]: Error::Io
/// [`report`]: crate::report
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A simulation parameter was rejected before the simulation started.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
    /// Writing a result file failed.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The worker pool for a parallel run could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// [`std::result::Result`]`<T, `[`votequeue::Error`]`>`
///
/// A type alias that simplifies the signatures of fallible functions in votequeue.
///
/// [`votequeue::Error`]: Error
pub type Result<T> = std::result::Result<T, Error>;
