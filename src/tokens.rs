//! Acquisition and rotation of the session tokens.
//!
//! The chat endpoint authenticates every exchange with two opaque values carried in headers:
//! the primary token (`x-vqd-4`) and the secondary token (`x-vqd-hash-1`).  The primary token
//! is handed out by the status endpoint and replaced by the server on every chat response; the
//! secondary token is best-effort.  Neither value is ever interpreted here.

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::{Error, Result};
use crate::observability::SESSION_AUTH_FAILURES;
use crate::transport::Transport;

/// Header carrying the primary token, in both directions.
pub const PRIMARY_TOKEN_HEADER: &str = "x-vqd-4";

/// Header carrying the secondary token, in both directions.
pub const SECONDARY_TOKEN_HEADER: &str = "x-vqd-hash-1";

/// Header asking the status endpoint to issue a token.
pub const TOKEN_REQUEST_HEADER: &str = "x-vqd-accept";

/// The token pair a session presents on each chat request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTokens {
    primary: String,
    secondary: Option<String>,
}

impl SessionTokens {
    /// Create a token pair.
    pub fn new(primary: impl Into<String>, secondary: Option<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary,
        }
    }

    /// The primary token.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// The secondary token, if the server issued one.
    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// Overwrite this pair with the tokens from a later response.
    ///
    /// The primary token is always replaced.  The secondary token is replaced only when the
    /// response carried one; otherwise the stored value stays.
    pub fn rotate(&mut self, rotated: SessionTokens) {
        self.primary = rotated.primary;
        if rotated.secondary.is_some() {
            self.secondary = rotated.secondary;
        }
    }

    /// Write the pair into request headers.  An absent secondary token is omitted.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        headers.insert(PRIMARY_TOKEN_HEADER, header_value(&self.primary)?);
        if let Some(secondary) = &self.secondary {
            headers.insert(SECONDARY_TOKEN_HEADER, header_value(secondary)?);
        }
        Ok(())
    }
}

fn header_value(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(token).map_err(|e| {
        Error::authentication(format!("session token is not a valid header value: {e}"))
    })
}

fn read_token<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Obtain the first token pair from `GET {base_url}/status`.
///
/// # Errors
///
/// Returns [`Error::Authentication`] when the status endpoint answers with a 4xx/5xx status or
/// omits the primary token.  Transport failures propagate unchanged.
pub async fn fetch_initial_tokens<T: Transport + ?Sized>(
    transport: &T,
    base_url: &str,
) -> Result<SessionTokens> {
    let url = format!("{base_url}/status");
    tracing::debug!(url = %url, "requesting session token");

    let mut headers = HeaderMap::new();
    headers.insert(TOKEN_REQUEST_HEADER, HeaderValue::from_static("1"));
    let response = transport.get(&url, headers).await?;

    if response.is_failure() {
        SESSION_AUTH_FAILURES.click();
        return Err(Error::authentication(format!(
            "status endpoint returned HTTP {}",
            response.status()
        )));
    }

    let tokens = extract_rotated_tokens(response.headers()).inspect_err(|_| {
        SESSION_AUTH_FAILURES.click();
    })?;
    tracing::debug!(token = tokens.primary(), "obtained session token");
    Ok(tokens)
}

/// Read the token pair from the headers of any response.
///
/// # Errors
///
/// Returns [`Error::Authentication`] when the primary token is absent or empty.
pub fn extract_rotated_tokens(headers: &HeaderMap) -> Result<SessionTokens> {
    let primary = read_token(headers, PRIMARY_TOKEN_HEADER).ok_or_else(|| {
        Error::authentication(format!("response carried no {PRIMARY_TOKEN_HEADER} token"))
    })?;
    let secondary = read_token(headers, SECONDARY_TOKEN_HEADER).map(String::from);
    Ok(SessionTokens::new(primary, secondary))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::transport::TransportResponse;

    struct StatusEndpoint {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        seen: Mutex<Vec<(String, HeaderMap)>>,
    }

    impl StatusEndpoint {
        fn new(status: u16, headers: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                status,
                headers,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for StatusEndpoint {
        async fn get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse> {
            self.seen.lock().unwrap().push((url.to_string(), headers));
            let mut response_headers = HeaderMap::new();
            for (name, value) in &self.headers {
                response_headers.insert(*name, HeaderValue::from_static(*value));
            }
            Ok(TransportResponse::new(
                self.status,
                response_headers,
                Box::new(Vec::new()),
            ))
        }

        async fn post(&self, _: &str, _: HeaderMap, _: String) -> Result<TransportResponse> {
            panic!("the status handshake never posts");
        }
    }

    #[tokio::test]
    async fn fetch_reads_both_tokens() {
        let endpoint = StatusEndpoint::new(
            200,
            vec![("x-vqd-4", "4-AAA"), ("x-vqd-hash-1", "hash-1")],
        );
        let tokens = fetch_initial_tokens(&endpoint, "https://foo.bar")
            .await
            .unwrap();
        assert_eq!(tokens.primary(), "4-AAA");
        assert_eq!(tokens.secondary(), Some("hash-1"));

        let seen = endpoint.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "https://foo.bar/status");
        assert_eq!(seen[0].1.get("x-vqd-accept").unwrap(), "1");
        assert_eq!(seen[0].1.len(), 1);
    }

    #[tokio::test]
    async fn fetch_tolerates_missing_secondary() {
        let endpoint = StatusEndpoint::new(200, vec![("x-vqd-4", "4-1234")]);
        let tokens = fetch_initial_tokens(&endpoint, "https://foo.bar")
            .await
            .unwrap();
        assert_eq!(tokens, SessionTokens::new("4-1234", None));
    }

    #[tokio::test]
    async fn fetch_requires_primary() {
        let endpoint = StatusEndpoint::new(200, vec![("x-vqd-hash-1", "hash-1")]);
        let err = fetch_initial_tokens(&endpoint, "https://foo.bar")
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn fetch_rejects_empty_primary() {
        let endpoint = StatusEndpoint::new(200, vec![("x-vqd-4", "")]);
        let err = fetch_initial_tokens(&endpoint, "https://foo.bar")
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn fetch_rejects_failure_status() {
        let endpoint = StatusEndpoint::new(403, vec![("x-vqd-4", "4-AAA")]);
        let err = fetch_initial_tokens(&endpoint, "https://foo.bar")
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn rotate_keeps_secondary_when_absent() {
        let mut tokens = SessionTokens::new("4-AAA", Some("hash-1".to_string()));
        tokens.rotate(SessionTokens::new("4-BBB", None));
        assert_eq!(tokens.primary(), "4-BBB");
        assert_eq!(tokens.secondary(), Some("hash-1"));

        tokens.rotate(SessionTokens::new("4-CCC", Some("hash-2".to_string())));
        assert_eq!(tokens.primary(), "4-CCC");
        assert_eq!(tokens.secondary(), Some("hash-2"));
    }

    #[test]
    fn apply_omits_absent_secondary() {
        let mut headers = HeaderMap::new();
        SessionTokens::new("4-AAA", None)
            .apply(&mut headers)
            .unwrap();
        assert_eq!(headers.get("x-vqd-4").unwrap(), "4-AAA");
        assert!(headers.get("x-vqd-hash-1").is_none());

        SessionTokens::new("4-BBB", Some("hash-1".to_string()))
            .apply(&mut headers)
            .unwrap();
        assert_eq!(headers.get("x-vqd-4").unwrap(), "4-BBB");
        assert_eq!(headers.get("x-vqd-hash-1").unwrap(), "hash-1");
    }

    #[test]
    fn apply_rejects_unprintable_token() {
        let mut headers = HeaderMap::new();
        let err = SessionTokens::new("bad\ntoken", None)
            .apply(&mut headers)
            .unwrap_err();
        assert!(err.is_authentication());
    }
}
