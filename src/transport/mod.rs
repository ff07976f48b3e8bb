//! Transport collaborator traits.
//!
//! This module defines the traits that decouple the clients from any specific
//! network implementation. Users provide their own transport (e.g. backed by
//! `reqwest`, `hyper`, or a test double) and the clients operate against these
//! traits. The clients perform no I/O of their own.

#[cfg(feature = "transport-reqwest")]
mod reqwest_0_13;

use std::future::Future;

use http::Extensions;

use crate::message::{Request, Response};

/// A transport that performs a request on the calling thread.
pub trait BlockingTransport: Send + Sync {
    /// The error type returned by the transport for a failed request.
    type Error: crate::Error;

    /// Executes `request` and blocks until a response or failure.
    ///
    /// # Arguments
    ///
    /// * `request`: The request to execute, with options already applied.
    /// * `extensions`: Transport-specific settings passed through from
    ///   [`RequestOptions`](crate::options::RequestOptions).
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` when no response could be obtained.
    fn execute_blocking(
        &self,
        request: Request,
        extensions: &Extensions,
    ) -> Result<Response, Self::Error>;
}

/// A transport that performs a request without blocking the caller.
pub trait AsyncTransport: Send + Sync + 'static {
    /// The error type returned by the transport for a failed request.
    type Error: crate::Error;

    /// Executes `request`.
    ///
    /// # Arguments
    ///
    /// * `request`: The request to execute, with options already applied.
    /// * `extensions`: Transport-specific settings passed through from
    ///   [`RequestOptions`](crate::options::RequestOptions).
    ///
    /// # Returns
    ///
    /// A `Future` that resolves to the response, or `Self::Error` on failure.
    /// Dropping the future must abandon the request; this is how cancellation
    /// reaches the transport.
    fn execute(
        &self,
        request: Request,
        extensions: Extensions,
    ) -> impl Future<Output = Result<Response, Self::Error>> + Send;
}
