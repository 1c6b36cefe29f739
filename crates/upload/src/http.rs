//! HTTPS implementation of [`UploadBackend`].
//!
//! `reqwest` client with optional Bearer token authentication. JSON bodies
//! for open and finalize, raw octet-stream bodies for chunks.

use std::time::Duration;

use oncostage_protocol::constants::{
    CHUNK_CHECKSUM_HEADER, CHUNK_CONTENT_TYPE, CHUNK_REQUEST_TIMEOUT, CHUNKS_SEGMENT,
    FINALIZE_SEGMENT, REQUEST_TIMEOUT, UPLOADS_PATH,
};
use oncostage_protocol::{
    ApiErrorBody, ChunkAck, FinalizeRequest, FinalizeResponse, OpenSessionRequest,
    OpenSessionResponse,
};
use oncostage_transfer::Chunk;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::backend::{BackendFuture, UploadBackend};
use crate::error::BackendError;

/// Files API client.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    chunk_timeout: Duration,
}

impl HttpBackend {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, api_token: Option<&str>) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| BackendError::Protocol("invalid API token".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: REQUEST_TIMEOUT,
            chunk_timeout: CHUNK_REQUEST_TIMEOUT,
        })
    }

    /// Overrides the JSON and chunk request timeouts.
    pub fn with_timeouts(mut self, request: Duration, chunk: Duration) -> Self {
        self.request_timeout = request;
        self.chunk_timeout = chunk;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn uploads_url(&self) -> String {
        format!("{}{}", self.base_url, UPLOADS_PATH)
    }

    fn session_url(&self, session_id: &str) -> String {
        let encoded = utf8_percent_encode(session_id, NON_ALPHANUMERIC);
        format!("{}/{encoded}", self.uploads_url())
    }

    /// Sends a request and decodes a JSON success body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let resp = request.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: describe_error_body(body),
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Prefers the structured `{code, message}` body when the backend sends one.
fn describe_error_body(body: String) -> String {
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) if err.code.is_empty() => err.message,
        Ok(err) => format!("{}: {}", err.code, err.message),
        Err(_) => body,
    }
}

impl UploadBackend for HttpBackend {
    fn open_session<'a>(
        &'a self,
        request: &'a OpenSessionRequest,
    ) -> BackendFuture<'a, OpenSessionResponse> {
        Box::pin(async move {
            let builder = self
                .http
                .post(self.uploads_url())
                .timeout(self.request_timeout)
                .json(request);
            self.send_json(builder).await
        })
    }

    fn put_chunk<'a>(
        &'a self,
        session_id: &'a str,
        chunk: &'a Chunk,
    ) -> BackendFuture<'a, ChunkAck> {
        Box::pin(async move {
            let url = format!(
                "{}/{CHUNKS_SEGMENT}/{}",
                self.session_url(session_id),
                chunk.index
            );
            let builder = self
                .http
                .put(url)
                .timeout(self.chunk_timeout)
                .header(CONTENT_TYPE, CHUNK_CONTENT_TYPE)
                .header(CHUNK_CHECKSUM_HEADER, chunk.checksum.as_str())
                .body(chunk.data.clone());
            self.send_json(builder).await
        })
    }

    fn finalize<'a>(
        &'a self,
        session_id: &'a str,
        request: &'a FinalizeRequest,
    ) -> BackendFuture<'a, FinalizeResponse> {
        Box::pin(async move {
            let url = format!("{}/{FINALIZE_SEGMENT}", self.session_url(session_id));
            let builder = self
                .http
                .post(url)
                .timeout(self.request_timeout)
                .json(request);
            self.send_json(builder).await
        })
    }
}
