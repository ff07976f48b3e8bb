use http::Extensions;

use super::{AsyncTransport, BlockingTransport};
use crate::message::{Request, Response};

impl AsyncTransport for reqwest::Client {
    /// The error type is `reqwest::Error`.
    type Error = reqwest::Error;

    /// Executes a [`Request`] using the `reqwest::Client`.
    ///
    /// The request is converted into a `reqwest::Request` and sent; the
    /// response body is read in full before the response is returned.
    async fn execute(
        &self,
        request: Request,
        _extensions: Extensions,
    ) -> Result<Response, Self::Error> {
        let reqwest_request = self
            .request(request.method().clone(), request.uri().to_string())
            .headers(request.headers().clone())
            .body(request.body().to_bytes())
            .build()?;

        let response = reqwest::Client::execute(self, reqwest_request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response::builder()
            .status(status)
            .headers(headers)
            .body(body)
            .build())
    }
}

impl BlockingTransport for reqwest::blocking::Client {
    /// The error type is `reqwest::Error`.
    type Error = reqwest::Error;

    /// Executes a [`Request`] using the `reqwest::blocking::Client`.
    fn execute_blocking(
        &self,
        request: Request,
        _extensions: &Extensions,
    ) -> Result<Response, Self::Error> {
        let reqwest_request = self
            .request(request.method().clone(), request.uri().to_string())
            .headers(request.headers().clone())
            .body(request.body().to_bytes())
            .build()?;

        let response = self.execute(reqwest_request)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?;

        Ok(Response::builder()
            .status(status)
            .headers(headers)
            .body(body)
            .build())
    }
}

impl crate::Error for reqwest::Error {
    fn is_retryable(&self) -> bool {
        self.is_connect() || self.is_timeout()
    }
}
