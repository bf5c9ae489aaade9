//! HTTP transport seam and the reqwest-backed implementation.

use std::pin::Pin;

use futures_core::Stream;
use futures_util::StreamExt;

use crate::{HttpRequest, ProviderError, ProviderFuture};

/// Response body as a stream of byte chunks. Dropping it releases the connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ProviderError>> + Send>>;

pub trait ProviderTransport: Send + Sync + std::fmt::Debug {
    /// Sends the request and resolves once response headers are available.
    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> ProviderFuture<'a, Result<TransportResponse, ProviderError>>;
}

pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    pub fn new(status: u16, body: ByteStream) -> Self {
        Self { status, body }
    }

    /// In-memory body split into the given chunks, as a fake network would deliver them.
    pub fn from_chunks<I, C>(status: u16, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let chunks = chunks
            .into_iter()
            .map(|chunk| Ok(chunk.into()))
            .collect::<Vec<Result<Vec<u8>, ProviderError>>>();

        Self::new(status, Box::pin(futures_util::stream::iter(chunks)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Collects the whole body as UTF-8 text, consuming the response.
    pub async fn text(self) -> Result<String, ProviderError> {
        let mut body = self.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        String::from_utf8(bytes)
            .map_err(|err| ProviderError::transport(format!("response body was not UTF-8: {err}")))
    }
}

#[cfg(feature = "http-transport")]
pub use http_transport::HttpTransport;

#[cfg(feature = "http-transport")]
mod http_transport {
    use async_stream::try_stream;
    use futures_util::StreamExt;
    use reqwest::Client;

    use super::{ProviderTransport, TransportResponse};
    use crate::{HttpRequest, ProviderError, ProviderFuture};

    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        /// Timeouts are configured on the client; the transport adds none of its own.
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    impl Default for HttpTransport {
        fn default() -> Self {
            Self::new(Client::new())
        }
    }

    fn map_request_error(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::timeout(err.to_string())
        } else {
            ProviderError::transport(err.to_string())
        }
    }

    impl ProviderTransport for HttpTransport {
        fn send<'a>(
            &'a self,
            request: HttpRequest,
        ) -> ProviderFuture<'a, Result<TransportResponse, ProviderError>> {
            Box::pin(async move {
                let response = self
                    .client
                    .request(request.method, request.url.as_str())
                    .headers(request.headers)
                    .json(&request.body)
                    .send()
                    .await
                    .map_err(map_request_error)?;

                let status = response.status().as_u16();
                let body = try_stream! {
                    let mut chunks = response.bytes_stream();
                    while let Some(chunk) = chunks.next().await {
                        let bytes = chunk.map_err(map_request_error)?;
                        yield bytes.to_vec();
                    }
                };

                Ok(TransportResponse::new(status, Box::pin(body)))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_collects_all_chunks() {
        let response = TransportResponse::from_chunks(200, ["Hel", "lo"]);
        assert!(response.is_success());
        assert_eq!(response.text().await.expect("text"), "Hello");
    }

    #[tokio::test]
    async fn invalid_utf8_bodies_are_transport_errors() {
        let response = TransportResponse::from_chunks(500, [vec![0xff_u8, 0xfe]]);
        assert!(!response.is_success());

        let error = response.text().await.expect_err("bytes are not UTF-8");
        assert_eq!(error.kind, crate::ProviderErrorKind::Transport);
    }
}
