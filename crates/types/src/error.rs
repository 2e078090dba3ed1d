//! Error taxonomy for jenky operations.
//!
//! Every public operation either returns a fully populated result or one of
//! these typed errors; nothing is downgraded to a default value. Transport
//! retries happen below this layer, so a `Network` error means the bounded
//! retries are already exhausted.

use thiserror::Error;

use crate::ValidationReport;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failure modes surfaced to callers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown Jenkins server '{0}'")]
    UnknownServer(String),

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Credentials or security token rejected even after the single
    /// refresh-and-retry pass.
    #[error("authentication rejected by server '{server}': {detail}")]
    Auth { server: String, detail: String },

    /// Supplied parameters do not satisfy the job's declared contract.
    /// This never reaches the remote server.
    #[error("parameter validation failed: {0}")]
    Validation(ValidationReport),

    /// The server denied an otherwise well-formed operation.
    #[error("permission denied for {operation} on {resource}")]
    Permission { operation: String, resource: String },

    #[error("job '{job}' not found on server '{server}'")]
    JobNotFound { job: String, server: String },

    #[error("build #{build_number} of job '{job}' not found on server '{server}'")]
    BuildNotFound {
        build_number: u32,
        job: String,
        server: String,
    },

    /// Transport-level failure, surfaced only after retries are exhausted.
    #[error("network failure talking to server '{server}' after {attempts} attempt(s): {detail}")]
    Network {
        server: String,
        attempts: u32,
        detail: String,
    },

    /// The server answered, but not with anything this engine can use.
    #[error("unexpected response from server '{server}' (HTTP {status}): {detail}")]
    Remote {
        server: String,
        status: u16,
        detail: String,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an authentication error for a server.
    pub fn auth(server: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Auth {
            server: server.into(),
            detail: detail.into(),
        }
    }

    /// Create a permission error for an operation on a resource.
    pub fn permission(operation: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            resource: resource.into(),
        }
    }

    /// Create a job-not-found error.
    pub fn job_not_found(job: impl Into<String>, server: impl Into<String>) -> Self {
        Self::JobNotFound {
            job: job.into(),
            server: server.into(),
        }
    }

    /// Create a build-not-found error.
    pub fn build_not_found(build_number: u32, job: impl Into<String>, server: impl Into<String>) -> Self {
        Self::BuildNotFound {
            build_number,
            job: job.into(),
            server: server.into(),
        }
    }

    /// Create an unexpected-response error.
    pub fn remote(server: impl Into<String>, status: u16, detail: impl Into<String>) -> Self {
        Self::Remote {
            server: server.into(),
            status,
            detail: detail.into(),
        }
    }
}
