//! Error types for the curlx client.
//!
//! # Design
//! Transport failures reported by libcurl are folded into a small set of
//! variants callers actually branch on: connection, timeout, redirect limit
//! and body cap. Everything else the engine reports lands in `Request` with
//! curl's own description. `Http` is only produced by
//! `Response::raise_for_status`, never by `Session::send`.

use thiserror::Error;

/// Errors returned by request building, execution and response decoding.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid local precondition or an unclassified engine failure.
    #[error("request error: {0}")]
    Request(String),

    /// The host could not be resolved or the connection was refused.
    #[error("connection error: {0}")]
    Connection(String),

    /// The transfer exceeded its configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The redirect chain exceeded the configured maximum.
    #[error("too many redirects: {0}")]
    TooManyRedirects(String),

    /// The response arrived but its status is not "ok" (4xx/5xx, or < 200).
    #[error("HTTP error: {status} {reason}")]
    Http { status: u32, reason: String },

    /// Malformed input rejected before any network activity.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// The header collection already holds its maximum number of entries.
    #[error("header count exceed the limit {max}")]
    Capacity { max: usize },

    /// The in-memory response body grew past the session's cap.
    #[error("response body exceed the limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The response body is not well-formed JSON.
    #[error("json parse error: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn request<S: ToString>(msg: S) -> Self {
        Self::Request(msg.to_string())
    }

    pub fn validation<S: ToString>(reason: S) -> Self {
        Self::Validation { reason: reason.to_string() }
    }

    pub fn capacity(max: usize) -> Self {
        Self::Capacity { max }
    }

    /// Map a libcurl failure onto the taxonomy.
    ///
    /// `body_overflow` is set by the in-memory sink when it refused a chunk,
    /// which libcurl only reports as a generic write error.
    pub fn from_curl(err: &curl::Error, body_overflow: Option<usize>) -> Self {
        let msg = match err.extra_description() {
            Some(extra) => format!("{} ({extra})", err.description()),
            None => err.description().to_string(),
        };

        if err.is_couldnt_connect() || err.is_couldnt_resolve_host() || err.is_couldnt_resolve_proxy() {
            return Self::Connection(msg);
        }
        if err.is_operation_timedout() {
            return Self::Timeout(msg);
        }
        if err.is_too_many_redirects() {
            return Self::TooManyRedirects(msg);
        }
        if let (true, Some(limit)) = (err.is_write_error(), body_overflow) {
            return Self::BodyTooLarge { limit };
        }
        Self::Request(msg)
    }

    /// True for failures raised by the transfer itself rather than by local
    /// validation or response decoding.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::TooManyRedirects(_) | Self::BodyTooLarge { .. }
        )
    }
}

impl From<curl::Error> for Error {
    fn from(err: curl::Error) -> Self {
        Self::from_curl(&err, None)
    }
}

impl From<curl::FormError> for Error {
    fn from(err: curl::FormError) -> Self {
        Self::Request(format!("multipart form: {err}"))
    }
}
