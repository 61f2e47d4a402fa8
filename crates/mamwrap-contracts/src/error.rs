//! Error types for the mamwrap client.
//!
//! All fallible operations return `MamResult<T>`. Job outcomes that the
//! platform reports as failed are not errors; they come back as
//! `JobResult::Failed`. Errors are reserved for things the client itself
//! could not do.

use thiserror::Error;

/// The unified error type for the mamwrap crates.
#[derive(Debug, Error)]
pub enum MamError {
    /// A selected policy id has no catalog entry. Raised before any network call.
    #[error("unknown policy id {id}")]
    UnknownPolicy { id: u32 },

    /// The platform answered with a non-success HTTP status.
    #[error("platform returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body carried a top-level `error` key.
    #[error("platform reported an error: {message}")]
    Api { message: String },

    /// The body was not JSON, or lacked a key the caller needed.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, body: String },

    /// The request never produced a response (connection, TLS, timeout).
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// The uploader did not return a file id. Automatic recovery is not
    /// possible; `fallback_command` reproduces the upload by hand.
    #[error("upload failed, retry manually with `{fallback_command}`")]
    Upload { raw: String, fallback_command: String },

    /// A configuration value or the policy catalog is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A poll loop was cancelled through its cancel token.
    #[error("polling cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// A poll loop hit its configured attempt bound without a terminal status.
    #[error("no terminal status after {attempts} attempt(s)")]
    PollLimitExceeded { attempts: u32 },
}

/// Convenience alias used throughout the mamwrap crates.
pub type MamResult<T> = Result<T, MamError>;
