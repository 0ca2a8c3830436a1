//! Error types for the benchmark harness.
//!
//! The taxonomy mirrors how failures propagate through the pipeline: launch
//! and non-zero-exit errors from external commands are fatal to the run;
//! per-revision benchmark failures are caught at the revision loop; delivery
//! failures are logged and swallowed inside the reporter and never surface
//! here at all.

use thiserror::Error;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Everything that can go wrong while measuring revisions.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An external command could not be started at all (missing executable,
    /// permission problem).
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command ran but exited non-zero (or died on a signal, in
    /// which case there is no code).
    #[error("command `{command}` failed with exit code {code:?}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Version control returned revision details we could not split into
    /// author, date, title, and message.
    #[error("malformed details for revision {revision}: {reason}")]
    MalformedDetails { revision: String, reason: String },

    /// A problem in the configuration file or the CLI flag combination.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem or pipe I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// HTTP client construction failure. Delivery failures are handled (and
    /// swallowed) inside the reporter; only building the client propagates.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}
