//! HTTP transport
//!
//! The client issues requests through [`HttpTransport`] so tests can observe
//! and script network traffic. [`ReqwestTransport`] is the real one.

use std::pin::Pin;

use ariko_core::{ErrorKind, RequestError};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::providers::AuthHeader;

/// Response body delivered chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body read failed after the response started
    #[error("response body error: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) => ErrorKind::Network,
            Self::Status {
                status: 401 | 403, ..
            } => ErrorKind::Auth,
            Self::Status { .. } => ErrorKind::Http,
            Self::Other(_) => ErrorKind::Unknown,
        }
    }
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Minimal HTTP surface used by the client
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, auth: Option<&AuthHeader>) -> Result<String, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        auth: Option<&AuthHeader>,
        body: String,
    ) -> Result<String, TransportError>;

    /// POST and return the body as a stream once the status is known good
    async fn post_json_stream(
        &self,
        url: &str,
        auth: Option<&AuthHeader>,
        body: String,
    ) -> Result<ByteStream, TransportError>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ariko/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    pub const fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn apply_auth(
        request: reqwest::RequestBuilder,
        auth: Option<&AuthHeader>,
    ) -> reqwest::RequestBuilder {
        match auth {
            Some(header) => request.header(header.name, &header.value),
            None => request,
        }
    }

    /// Map non-2xx responses to `Status`, keeping the body for the message
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, auth: Option<&AuthHeader>) -> Result<String, TransportError> {
        let request = Self::apply_auth(self.http.get(url), auth);
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.text().await?)
    }

    async fn post_json(
        &self,
        url: &str,
        auth: Option<&AuthHeader>,
        body: String,
    ) -> Result<String, TransportError> {
        let request = Self::apply_auth(self.http.post(url), auth)
            .header("Content-Type", "application/json")
            .body(body);
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.text().await?)
    }

    async fn post_json_stream(
        &self,
        url: &str,
        auth: Option<&AuthHeader>,
        body: String,
    ) -> Result<ByteStream, TransportError> {
        let request = Self::apply_auth(self.http.post(url), auth)
            .header("Content-Type", "application/json")
            .body(body);
        let response = Self::check_status(request.send().await?).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(TransportError::Timeout.kind(), ErrorKind::Network);
        assert_eq!(TransportError::Connect("refused".into()).kind(), ErrorKind::Network);
        assert_eq!(
            TransportError::Status {
                status: 401,
                body: "bad key".into()
            }
            .kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            TransportError::Status {
                status: 500,
                body: "boom".into()
            }
            .kind(),
            ErrorKind::Http
        );
    }

    #[test]
    fn test_status_body_kept_in_message() {
        let err: RequestError = TransportError::Status {
            status: 429,
            body: "rate limited".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Http);
        assert!(err.message.contains("rate limited"));
    }
}
