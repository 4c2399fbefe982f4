//! A client for the DuckDuckGo chat API.
//!
//! The protocol layer is small: [`ChatSession`] obtains a token pair from the status endpoint,
//! then sends the conversation to the chat endpoint, decodes the streamed reply and rotates
//! the tokens after every exchange.
//!
//! ```no_run
//! # async fn demo() -> duckchat::Result<()> {
//! use duckchat::{ChatSession, KnownModel};
//!
//! let mut session = ChatSession::new(
//!     duckchat::chat::DEFAULT_BASE_URL,
//!     KnownModel::Gpt4oMini.model_id(),
//! );
//! session.initialize().await?;
//! let answer = session.prompt("Say hello").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod error;
pub mod message;
pub mod model;
pub mod observability;
pub mod session;
pub mod stream;
pub mod tokens;
pub mod transport;

pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use model::KnownModel;
pub use observability::register_biometrics;
pub use session::{ChatSession, Connector};
pub use stream::{EventStreamDecoder, StreamedReply, decode_event_stream};
pub use tokens::{SessionTokens, extract_rotated_tokens, fetch_initial_tokens};
pub use transport::{HttpTransport, LineReader, Transport, TransportResponse};
