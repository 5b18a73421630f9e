use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::generator::Generator;

/// Errors produced while planning or running a thumbnail job.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The combination of command line options cannot describe a job.
    #[error("{0}")]
    InvalidArguments(String),

    /// The output directory does not exist or is not a directory.
    #[error("{}: not a directory", .0.display())]
    InvalidOutputPath(PathBuf),

    #[error("{}: no such file", .0.display())]
    InputNotFound(PathBuf),

    /// The generator exited unsuccessfully or could not be launched at all.
    /// `exit_code` is `None` when the process never ran or was killed by a signal.
    #[error("{generator} failed: {reason}")]
    GeneratorFailed {
        generator: Generator,
        exit_code: Option<i32>,
        reason: String,
    },

    #[error("{context}")]
    Filesystem {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("writing archive {}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ThumbnailError {
    pub(crate) fn filesystem(context: impl Into<String>, source: io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }

    /// Whether the error was detected before any subprocess was spawned.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArguments(_) | Self::InvalidOutputPath(_) | Self::InputNotFound(_)
        )
    }
}

pub type Result<T, E = ThumbnailError> = std::result::Result<T, E>;
