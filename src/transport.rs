//! HTTP transport consumed by the chat session.
//!
//! The session never talks to `reqwest` directly.  It goes through the [`Transport`] trait, which
//! issues a GET or POST and hands back a [`TransportResponse`]: status, headers, and a body that
//! is read as lines.  [`HttpTransport`] is the production implementation; tests substitute their
//! own.

use std::io;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use tokio::io::AsyncReadExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_ERRORS, STREAM_LINES,
};

const USER_AGENT: &str = concat!("duckchat/", env!("CARGO_PKG_VERSION"));

///////////////////////////////////////////// LineReader ////////////////////////////////////////////

/// The body of a response, consumed line by line.
#[async_trait::async_trait]
pub trait LineReader: Send {
    /// Read the next line of the body, without its terminator.  `None` marks the end of the
    /// body.
    async fn next_line(&mut self) -> Result<Option<String>>;

    /// Read the rest of the body verbatim.
    async fn read_to_string(&mut self) -> Result<String>;
}

/// An in-memory body.  Lines are handed out in order; the raw form joins them with `\n`.
#[async_trait::async_trait]
impl LineReader for Vec<String> {
    async fn next_line(&mut self) -> Result<Option<String>> {
        if self.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.remove(0)))
        }
    }

    async fn read_to_string(&mut self) -> Result<String> {
        Ok(std::mem::take(self).join("\n"))
    }
}

///////////////////////////////////////// TransportResponse /////////////////////////////////////////

/// A response as seen by the protocol layer.
pub struct TransportResponse {
    status: u16,
    headers: HeaderMap,
    body: Box<dyn LineReader>,
}

impl TransportResponse {
    /// Assemble a response from its parts.
    pub fn new(status: u16, headers: HeaderMap, body: Box<dyn LineReader>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for 4xx and 5xx statuses.
    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }

    /// The response headers.  Lookups are case-insensitive.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the named header as a string, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Read the next line of the body.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.body.next_line().await
    }

    /// Read every remaining line of the body.  Only returns once the body ends.
    pub async fn read_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Read the remaining body as it was sent, for diagnostics.
    pub async fn read_text(&mut self) -> Result<String> {
        self.body.read_to_string().await
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

///////////////////////////////////////////// Transport /////////////////////////////////////////////

/// The request side of the wire.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET with the given headers.
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse>;

    /// Issue a POST with the given headers and body.
    async fn post(&self, url: &str, headers: HeaderMap, body: String)
    -> Result<TransportResponse>;
}

/////////////////////////////////////////// HttpTransport ///////////////////////////////////////////

/// [`Transport`] over a single, reused `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport.  `None` leaves requests without a timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = ReqwestClient::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;
        Ok(Self { client, timeout })
    }

    /// The configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn send_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    fn into_transport_response(response: Response) -> TransportResponse {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = HttpLineReader::new(response);
        TransportResponse::new(status, headers, Box::new(body))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        Ok(Self::into_transport_response(response))
    }

    async fn post(
        &self,
        url: &str,
        mut headers: HeaderMap,
        body: String,
    ) -> Result<TransportResponse> {
        CLIENT_REQUESTS.click();
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        Ok(Self::into_transport_response(response))
    }
}

/////////////////////////////////////////// HttpLineReader //////////////////////////////////////////

type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Frames a `reqwest` body into lines as it arrives.
struct HttpLineReader {
    frames: FramedRead<StreamReader<BodyStream, Bytes>, LinesCodec>,
}

impl HttpLineReader {
    fn new(response: Response) -> Self {
        let stream: BodyStream = Box::pin(response.bytes_stream().map_err(io::Error::other));
        let frames = FramedRead::new(StreamReader::new(stream), LinesCodec::new());
        Self { frames }
    }
}

#[async_trait::async_trait]
impl LineReader for HttpLineReader {
    async fn next_line(&mut self) -> Result<Option<String>> {
        match self.frames.next().await {
            Some(Ok(line)) => {
                STREAM_LINES.click();
                Ok(Some(line))
            }
            Some(Err(err)) => {
                STREAM_ERRORS.click();
                Err(lines_error(err))
            }
            None => Ok(None),
        }
    }

    async fn read_to_string(&mut self) -> Result<String> {
        // Bytes the codec buffered but has not framed yet come first.
        let mut raw = self.frames.read_buffer_mut().split().to_vec();
        self.frames
            .get_mut()
            .read_to_end(&mut raw)
            .await
            .map_err(|e| {
                Error::http_client(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })?;
        String::from_utf8(raw)
            .map_err(|e| Error::encoding(format!("Invalid UTF-8 in body: {e}"), Some(Box::new(e))))
    }
}

fn lines_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
        }
        LinesCodecError::Io(e) => {
            Error::http_client(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
        }
        LinesCodecError::MaxLineLengthExceeded => {
            Error::encoding("line length limit exceeded in stream", None)
        }
    }
}
