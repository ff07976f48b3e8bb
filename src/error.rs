//! Error types and the [`Error`] trait.
//!
//! All errors in this library implement the [`Error`] trait, which extends
//! [`std::error::Error`] with retry semantics. The contract layer never retries
//! on its own; it only reports whether a failure might succeed on a second
//! attempt so that callers (or transports) can apply their own policy.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use snafu::{AsErrorSource, Snafu};

use crate::promise::Cancelled;

/// Errors that may occur in the library.
pub trait Error: std::error::Error + AsErrorSource + Send + Sync + 'static {
    /// If true, this indicates that a failed request may succeed if retried.
    fn is_retryable(&self) -> bool;
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A reference-counted, type-erased error.
///
/// Transport errors are rarely `Clone`, but a settled [`Promise`](crate::promise::Promise)
/// hands its rejection to every registered continuation. Wrapping the
/// transport error here makes it shareable while keeping retryability.
#[derive(Clone)]
pub struct SharedError {
    source: Arc<dyn Error>,
}

impl SharedError {
    /// Create a new shared error from a generic `Error`.
    pub fn from_err<E: Error>(err: E) -> Self {
        Self {
            source: Arc::new(err),
        }
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn Error + 'static) {
        &*self.source
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.source, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.source, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

impl Error for SharedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// A value passed to the library could not be turned into a URI, request,
/// header or stream.
///
/// These failures are raised synchronously, at construction time, and never
/// reach the transport.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InvalidArgumentError {
    /// The string is not a syntactically valid URI.
    #[snafu(display("Invalid URI {input:?}: {reason}"))]
    InvalidUri {
        /// The rejected input.
        input: String,
        /// Why the input was rejected.
        reason: String,
    },
    /// An `http` or `https` URI was given without a host.
    #[snafu(display("URI {input:?} requires a host for scheme {scheme}"))]
    MissingHost {
        /// The rejected input.
        input: String,
        /// The scheme requiring a host.
        scheme: String,
    },
    /// The URI cannot be expressed as an absolute `http::Uri`.
    #[snafu(display("URI {input:?} cannot be sent: {source}"))]
    UnsendableUri {
        /// The rendered URI.
        input: String,
        /// The underlying error.
        source: http::uri::InvalidUri,
    },
    /// The request method is not a valid HTTP method token.
    #[snafu(display("Invalid HTTP method: {source}"))]
    InvalidMethod {
        /// The underlying error.
        source: http::Error,
    },
    /// A header line did not have the form `Name: value`.
    #[snafu(display("Header line {line:?} is not of the form `Name: value`"))]
    InvalidHeaderLine {
        /// The rejected line.
        line: String,
    },
    /// A header name contained invalid characters.
    #[snafu(display("Invalid header name {name:?}"))]
    InvalidHeaderName {
        /// The rejected name.
        name: String,
        /// The underlying error.
        source: http::header::InvalidHeaderName,
    },
    /// A header value contained invalid characters.
    #[snafu(display("Invalid value for header {name:?}"))]
    InvalidHeaderValue {
        /// The header the value was meant for.
        name: String,
        /// The underlying error.
        source: http::header::InvalidHeaderValue,
    },
    /// The data cannot be represented as a byte stream.
    #[snafu(display("Cannot convert {kind} to a stream"))]
    UncoercibleStream {
        /// A description of the rejected data.
        kind: &'static str,
    },
    /// The reader failed while its contents were being collected.
    #[snafu(display("Failed to read stream data"))]
    UnreadableStream {
        /// The underlying error.
        source: std::io::Error,
    },
}

impl From<Infallible> for InvalidArgumentError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl Error for InvalidArgumentError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::UnreadableStream { source } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// Errors surfaced by the clients.
///
/// This is also the rejection type of the promises returned by
/// [`AsyncClient`](crate::client::AsyncClient), so it is cheap to clone.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    /// The request could not be built from the given arguments.
    #[snafu(display("Invalid argument"))]
    InvalidArgument {
        /// The underlying error.
        source: Arc<InvalidArgumentError>,
    },
    /// The transport failed to produce a response.
    #[snafu(display("Transport failed"))]
    Transport {
        /// The error reported by the transport.
        source: SharedError,
    },
    /// The operation was cancelled before it completed.
    #[snafu(display("Operation cancelled"))]
    Cancelled,
}

impl ClientError {
    /// Wrap a transport failure.
    pub fn transport<E: Error>(err: E) -> Self {
        Self::Transport {
            source: SharedError::from_err(err),
        }
    }

    /// Returns true if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<InvalidArgumentError> for ClientError {
    fn from(source: InvalidArgumentError) -> Self {
        Self::InvalidArgument {
            source: Arc::new(source),
        }
    }
}

impl From<Cancelled> for ClientError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl Error for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidArgument { .. } | Self::Cancelled => false,
            Self::Transport { source } => source.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, Snafu)]
    #[snafu(display("connection refused"))]
    struct Refused {
        retryable: bool,
    }

    impl Error for Refused {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[test]
    fn shared_error_preserves_display_and_retryability() {
        let shared = SharedError::from_err(Refused { retryable: true });
        let cloned = shared.clone();

        assert_eq!(cloned.to_string(), "connection refused");
        assert!(cloned.is_retryable());
        assert!(shared.source().is_none());
    }

    #[test]
    fn client_error_retryability_follows_transport() {
        let retryable = ClientError::transport(Refused { retryable: true });
        let fatal = ClientError::transport(Refused { retryable: false });

        assert!(retryable.is_retryable());
        assert!(!fatal.is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
    }

    #[test]
    fn invalid_argument_converts_into_client_error() {
        let err: ClientError = InvalidArgumentError::InvalidHeaderLine {
            line: "nope".to_owned(),
        }
        .into();

        assert!(matches!(err, ClientError::InvalidArgument { .. }));
        assert!(!err.is_retryable());
        assert!(err.source().is_some());
    }

    #[test]
    fn cancelled_converts_into_client_error() {
        let err = ClientError::from(Cancelled);
        assert!(err.is_cancelled());
    }
}
