//! Decoding of the chat endpoint's event stream.
//!
//! A chat response body is a newline-delimited sequence of events:
//!
//! ```text
//! data: {"message": "this", "model": "...", "created": 1}
//!
//! data: {"message": " is a test", "model": "...", "created": 1}
//!
//! data: {"model": "...", "created": 1}
//!
//! data: [DONE]
//! ```
//!
//! [`EventStreamDecoder`] folds such a sequence, line by line, into the concatenated reply text;
//! [`decode_event_stream`] runs it over a finite sequence.
//! [`StreamedReply`] binds one response to its decoded text and computes it at most once.

use std::time::Instant;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::observability::{STREAM_DURATION, STREAM_ERRORS};
use crate::tokens::{SessionTokens, extract_rotated_tokens};
use crate::transport::TransportResponse;

/// Prefix of every event line.
pub const DATA_PREFIX: &str = "data: ";

/// The line that ends the stream.
pub const DONE_SENTINEL: &str = "data: [DONE]";

#[derive(Deserialize)]
struct EventPayload {
    #[serde(default)]
    message: Option<String>,
}

/// Incremental event-stream decoder.
///
/// Lines are fed one at a time; [`EventStreamDecoder::feed`] reports when the sentinel has been
/// seen so the caller can stop reading.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    text: String,
    done: bool,
}

impl EventStreamDecoder {
    /// Create a decoder with no accumulated text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line.  Returns false once [`DONE_SENTINEL`] has been seen; later lines are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for a non-blank line without the `data: ` prefix and
    /// [`Error::Serialization`] for a payload that is not a JSON object.
    pub fn feed(&mut self, line: &str) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }
        if line == DONE_SENTINEL {
            self.done = true;
            return Ok(false);
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Err(Error::protocol(line));
        };
        let event: EventPayload = serde_json::from_str(payload).map_err(|e| {
            Error::serialization(
                format!("Malformed event payload in '{line}': {e}"),
                Some(Box::new(e)),
            )
        })?;
        if let Some(message) = event.message {
            self.text.push_str(&message);
        }
        Ok(true)
    }

    /// True once the sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The text accumulated so far.
    pub fn finish(self) -> String {
        self.text
    }
}

/// Decode a finite sequence of event-stream lines into the reply text.
///
/// Blank lines are skipped and [`DONE_SENTINEL`] stops decoding; anything after it is ignored.
/// A stream that ends without the sentinel yields whatever was accumulated.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for a non-blank line without the `data: ` prefix and
/// [`Error::Serialization`] for a payload that is not a JSON object.  No partial text is
/// returned in either case.
pub fn decode_event_stream<I, S>(lines: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut decoder = EventStreamDecoder::new();
    for line in lines {
        if !decoder.feed(line.as_ref())? {
            break;
        }
    }
    Ok(decoder.finish())
}

/// One chat response together with its decoded text.
///
/// The body is read and decoded on the first call to [`StreamedReply::text`].  Reading stops at
/// the sentinel, so a server that holds the connection open afterwards does not stall the
/// reply.  The outcome, success or failure, is cached and every later call returns it without
/// touching the body again.
#[derive(Debug)]
pub struct StreamedReply {
    response: TransportResponse,
    outcome: Option<Result<String>>,
}

impl StreamedReply {
    /// Wrap a response whose body has not been read yet.
    pub fn new(response: TransportResponse) -> Self {
        Self {
            response,
            outcome: None,
        }
    }

    /// True once the body has been read, whether or not it decoded.
    pub fn is_decoded(&self) -> bool {
        self.outcome.is_some()
    }

    /// The decoded reply text.
    ///
    /// # Errors
    ///
    /// Propagates body read failures and the errors of [`EventStreamDecoder::feed`].  A failure
    /// is returned again by every later call.
    pub async fn text(&mut self) -> Result<&str> {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => decode_body(&mut self.response).await.inspect_err(|_| {
                STREAM_ERRORS.click();
            }),
        };
        match self.outcome.insert(outcome) {
            Ok(text) => Ok(text.as_str()),
            Err(err) => Err(err.clone()),
        }
    }

    /// The rotated tokens carried in the response headers.
    pub fn tokens(&self) -> Result<SessionTokens> {
        extract_rotated_tokens(self.response.headers())
    }

    /// The underlying response.
    pub fn response(&self) -> &TransportResponse {
        &self.response
    }
}

async fn decode_body(response: &mut TransportResponse) -> Result<String> {
    let start = Instant::now();
    let mut decoder = EventStreamDecoder::new();
    while let Some(line) = response.next_line().await? {
        if !decoder.feed(&line)? {
            break;
        }
    }
    STREAM_DURATION.add(start.elapsed().as_secs_f64());
    Ok(decoder.finish())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;
    use crate::transport::LineReader;

    #[test]
    fn empty_stream_is_empty_text() {
        let lines: Vec<&str> = Vec::new();
        assert_eq!(decode_event_stream(lines).unwrap(), "");
    }

    #[test]
    fn realistic_stream() {
        let lines = [
            "data: {\"message\": \"this\"}\n",
            "",
            "data: {\"message\": \" is\"}\n",
            "",
            "data: {\"message\": \" a\"}\n",
            "",
            "data: {\"message\": \" test.\"}\n",
            "",
            "data: [DONE]\n",
        ];
        assert_eq!(decode_event_stream(lines).unwrap(), "this is a test.");
    }

    #[test]
    fn missing_message_contributes_nothing() {
        let lines = [
            "data: {\"message\": \"hi\", \"model\": \"gpt-4o-mini\", \"created\": 1}",
            "data: {\"model\": \"gpt-4o-mini\", \"created\": 2}",
            "data: {\"message\": null}",
            "data: {\"message\": \"!\"}",
        ];
        assert_eq!(decode_event_stream(lines).unwrap(), "hi!");
    }

    #[test]
    fn done_stops_decoding() {
        let lines = [
            "data: {\"message\": \"kept\"}",
            "data: [DONE]",
            "data: {\"message\": \"dropped\"}",
            "garbage after the end",
        ];
        assert_eq!(decode_event_stream(lines).unwrap(), "kept");
    }

    #[test]
    fn unterminated_stream_returns_accumulated_text() {
        let lines = ["data: {\"message\": \"part\"}", "data: {\"message\": \"ial\"}"];
        assert_eq!(decode_event_stream(lines).unwrap(), "partial");
    }

    #[test]
    fn line_without_prefix_is_protocol_error() {
        let lines = [
            "data: {\"message\": \"ignored\"}",
            "This line had no prefix",
        ];
        match decode_event_stream(lines) {
            Err(Error::Protocol { line }) => assert_eq!(line, "This line had no prefix"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn bad_json_is_serialization_error() {
        let lines = ["data: {not json"];
        let err = decode_event_stream(lines).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    /// Hands out scripted lines, counting every read; reading past the end fails.
    struct CountingReader {
        lines: Vec<String>,
        reads: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl LineReader for CountingReader {
        async fn next_line(&mut self) -> Result<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.lines.is_empty() {
                return Err(Error::timeout("body stayed open", Some(60.0)));
            }
            Ok(Some(self.lines.remove(0)))
        }

        async fn read_to_string(&mut self) -> Result<String> {
            Ok(std::mem::take(&mut self.lines).join("\n"))
        }
    }

    fn counted_reply(lines: &[&str]) -> (StreamedReply, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            reads: Arc::clone(&reads),
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-vqd-4", HeaderValue::from_static("4-BBB"));
        let response = TransportResponse::new(200, headers, Box::new(reader));
        (StreamedReply::new(response), reads)
    }

    #[test]
    fn decoder_reports_done() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.feed("data: {\"message\": \"a\"}").unwrap());
        assert!(decoder.feed("").unwrap());
        assert!(!decoder.is_done());
        assert!(!decoder.feed("data: [DONE]").unwrap());
        assert!(decoder.is_done());
        assert!(!decoder.feed("not even data").unwrap());
        assert_eq!(decoder.finish(), "a");
    }

    #[test]
    fn text_is_memoized() {
        let (mut reply, reads) = counted_reply(&["data: {\"message\": \"foo\"}", "data: [DONE]"]);
        assert!(!reply.is_decoded());
        let first = tokio_test::block_on(reply.text()).unwrap().to_string();
        let after_first = reads.load(Ordering::SeqCst);
        let second = tokio_test::block_on(reply.text()).unwrap().to_string();
        assert_eq!(first, "foo");
        assert_eq!(first, second);
        assert!(reply.is_decoded());
        assert_eq!(reads.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn reading_stops_at_done() {
        // The reader fails if asked for a line past the sentinel.
        let (mut reply, reads) =
            counted_reply(&["data: {\"message\": \"hello\"}", "", "data: [DONE]"]);
        assert_eq!(tokio_test::block_on(reply.text()).unwrap(), "hello");
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failed_decode_is_cached() {
        let (mut reply, reads) = counted_reply(&["oops"]);
        match tokio_test::block_on(reply.text()) {
            Err(Error::Protocol { line }) => assert_eq!(line, "oops"),
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert!(reply.is_decoded());
        match tokio_test::block_on(reply.text()) {
            Err(Error::Protocol { line }) => assert_eq!(line, "oops"),
            other => panic!("expected protocol error again, got {other:?}"),
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reply_exposes_rotated_tokens() {
        let (reply, _) = counted_reply(&[]);
        let tokens = reply.tokens().unwrap();
        assert_eq!(tokens.primary(), "4-BBB");
        assert_eq!(tokens.secondary(), None);
    }
}
