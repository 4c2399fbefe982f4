//! The chat session.
//!
//! A [`ChatSession`] owns one conversation with the chat endpoint: the message history, the
//! current token pair and the transport.  It is driven in two steps:
//!
//! 1. [`ChatSession::initialize`] creates the transport and obtains the first token pair.
//! 2. [`ChatSession::prompt`] sends the whole history plus a new user turn, decodes the streamed
//!    reply, records it, and rotates the tokens for the next call.
//!
//! Calls take `&mut self`, so one session serves exactly one conversation at a time.  Nothing
//! is shared between sessions; several may coexist in one process.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::observability::{SESSION_INITIALIZED, SESSION_PROMPTS, SESSION_TOKEN_ROTATIONS};
use crate::stream::StreamedReply;
use crate::tokens::{SessionTokens, fetch_initial_tokens};
use crate::transport::{HttpTransport, Transport};

/// Creates the transport on first use.
pub type Connector<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// A conversation with the chat endpoint.
pub struct ChatSession<T: Transport = HttpTransport> {
    base_url: String,
    model: String,
    messages: Vec<Message>,
    tokens: Option<SessionTokens>,
    transport: Option<T>,
    connect: Connector<T>,
}

impl ChatSession<HttpTransport> {
    /// Creates a session that talks HTTP without a client-side timeout.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(base_url, model, None)
    }

    /// Creates a session whose HTTP transport uses the given timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self::with_connector(base_url, model, move || HttpTransport::new(timeout))
    }
}

impl<T: Transport> ChatSession<T> {
    /// Creates a session whose transport is produced by `connect` during
    /// [`initialize`](Self::initialize).
    pub fn with_connector<F>(
        base_url: impl Into<String>,
        model: impl Into<String>,
        connect: F,
    ) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        tracing::debug!(base_url = %base_url, model = %model, "created chat session");
        Self {
            base_url,
            model,
            messages: Vec::new(),
            tokens: None,
            transport: None,
            connect: Box::new(connect),
        }
    }

    /// Acquires the transport and obtains the first token pair.
    ///
    /// The transport is created on the first call and reused afterwards.  Any previous tokens
    /// are dropped first, so a failed call leaves the session not ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the status endpoint fails or issues no token.
    pub async fn initialize(&mut self) -> Result<()> {
        tracing::debug!("initializing chat session");
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => {
                tracing::debug!("creating transport");
                (self.connect)()?
            }
        };
        let transport = &*self.transport.insert(transport);
        self.tokens = None;
        let tokens = fetch_initial_tokens(transport, &self.base_url).await?;
        self.tokens = Some(tokens);
        SESSION_INITIALIZED.click();
        Ok(())
    }

    /// Sends `text` as the next user turn and returns the assistant's reply.
    ///
    /// The user turn is appended before the request goes out and stays in the history even when
    /// the call fails.  The reply is appended only when the response also carried rotated
    /// tokens; the stored tokens are then replaced by them.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`] if the session was never initialized, or the response
    ///   carried no primary token.
    /// - [`Error::Request`] if the endpoint answered with a 4xx/5xx status.
    /// - [`Error::Protocol`] if the reply stream is malformed.
    pub async fn prompt(&mut self, text: &str) -> Result<String> {
        let (Some(tokens), Some(transport)) = (self.tokens.as_ref(), self.transport.as_ref())
        else {
            return Err(Error::authentication(
                "session is not initialized; call initialize() before prompt()",
            ));
        };

        let mut headers = HeaderMap::new();
        tokens.apply(&mut headers)?;
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));

        self.messages.push(Message::user(text));
        SESSION_PROMPTS.click();

        let body = serde_json::to_string(&ChatRequest {
            model: &self.model,
            messages: &self.messages,
        })?;
        let url = format!("{}/chat", self.base_url);
        tracing::debug!(url = %url, messages = self.messages.len(), "sending prompt");

        let mut response = transport.post(&url, headers, body).await?;
        tracing::debug!(
            status = response.status(),
            headers = ?response.headers(),
            "response headers"
        );

        if response.is_failure() {
            let status = response.status();
            let body = response
                .read_text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(Error::request(status, body));
        }

        let mut reply = StreamedReply::new(response);
        let answer = reply.text().await?.to_string();
        let rotated = reply.tokens()?;
        self.messages.push(Message::assistant(answer.clone()));

        if let Some(tokens) = self.tokens.as_mut() {
            tracing::debug!(
                old = tokens.primary(),
                new = rotated.primary(),
                "session token changed"
            );
            tokens.rotate(rotated);
            SESSION_TOKEN_ROTATIONS.click();
        }

        Ok(answer)
    }

    /// Clears the conversation history.  Tokens and transport are kept.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Returns the conversation history in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Changes the model used for subsequent prompts.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Returns the current model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the endpoint this session talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current token pair, if the session has been initialized.
    pub fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    /// True once [`initialize`](Self::initialize) has succeeded.
    pub fn is_ready(&self) -> bool {
        self.tokens.is_some()
    }
}
