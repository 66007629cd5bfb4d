//! Chat gateway port
//!
//! Defines how the application layer sends a conversation to the
//! language-model endpoint and receives the reply as raw byte chunks.

use async_trait::async_trait;
use cud_domain::{HistoryEntry, ModelId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during chat gateway operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Response has no body")]
    MissingBody,

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// One outgoing chat request.
///
/// `history` is the conversation so far; the gateway appends `message` as
/// the final user entry and may prepend its own system entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: ModelId,
    pub message: String,
    pub history: Vec<HistoryEntry>,
}

impl ChatRequest {
    pub fn new(model: ModelId, message: impl Into<String>, history: Vec<HistoryEntry>) -> Self {
        Self {
            model,
            message: message.into(),
            history,
        }
    }

    /// History followed by the new user entry, as sent on the wire
    pub fn messages(&self) -> Vec<HistoryEntry> {
        let mut messages = self.history.clone();
        messages.push(HistoryEntry::user(self.message.clone()));
        messages
    }
}

/// Chunked response body.
///
/// Wraps an `mpsc::Receiver` fed by the transport. The channel closing is
/// the end-of-stream signal; an `Err` item aborts the stream.
#[derive(Debug)]
pub struct ChunkStream {
    pub receiver: mpsc::Receiver<Result<Vec<u8>, GatewayError>>,
}

impl ChunkStream {
    pub fn new(receiver: mpsc::Receiver<Result<Vec<u8>, GatewayError>>) -> Self {
        Self { receiver }
    }

    /// Suspend until the next chunk arrives; `None` at end-of-stream.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, GatewayError>> {
        self.receiver.recv().await
    }
}

/// Gateway for streaming chat completions
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Issue `request` and return the response body as a chunk stream.
    ///
    /// Errors returned here mean the request never produced a body.
    async fn send_chat(&self, request: ChatRequest) -> Result<ChunkStream, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_appends_user_entry() {
        let request = ChatRequest::new(
            ModelId::default(),
            "again",
            vec![HistoryEntry::user("hi"), HistoryEntry::assistant("hello")],
        );
        let messages = request.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], HistoryEntry::user("again"));
    }

    #[tokio::test]
    async fn test_chunk_stream_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = ChunkStream::new(rx);
        tx.send(Ok(b"abc".to_vec())).await.unwrap();
        drop(tx);

        assert_eq!(stream.next_chunk().await, Some(Ok(b"abc".to_vec())));
        assert_eq!(stream.next_chunk().await, None);
    }
}
