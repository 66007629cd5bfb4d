//! Streaming chat gateway for Ollama-compatible `/api/chat` endpoints.
//!
//! The request carries a system entry with the image directive
//! instructions, then the conversation history and the new user message.
//! The response body is newline-delimited JSON; this adapter forwards the
//! raw byte chunks and leaves line decoding to the caller.

use crate::config::FileChatConfig;
use async_trait::async_trait;
use cud_application::{ChatGateway, ChatRequest, ChunkStream, GatewayError};
use cud_domain::{HistoryEntry, ModelId};
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Chunks buffered between the HTTP reader task and the consumer
const CHUNK_BUFFER: usize = 32;

/// Instructions prepended to every request unless overridden in config
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You can generate any image the user requests by responding with a command in this format:
[GENERATE_IMAGE]{
  "prompt": "your prompt here",
  "negative": "optional negative prompt",
  "resolution": "preset_name",
  "response_during_generation": "A message to show while the image is being generated"
}
Available resolution presets:
- "selfie": Vertical 512x768, best for close-up shots
- "profile": Horizontal 768x512, ideal for profile views
- "landscape": Wide 1024x768, perfect for scenes
- "square": 768x768, for balanced compositions
- "portrait": Tall 768x1024, ideal for full body shots

Choose the most appropriate resolution for the image being requested.
If no resolution is specified, "landscape" will be used as default.
Include a "response_during_generation" message to keep the user informed while the image is being generated; it should suggest that you are taking the photo or creating the art in question.
You may only generate one image per response.
Do not include any other text in the response, only the command.
If you are asked to generate an image of yourself or someone else, use the selfie or portrait resolution.
Unless asked to create an illustration or art, prefer phrasing like "Selfie of a..." or "Photo of a...".
Include the lighting the photograph should have, if necessary.
Include the pose the person should have, if necessary.
Never include exact ages in a prompt; use "young", "middle-aged", "old" and similar instead."#;

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a ModelId,
    messages: Vec<HistoryEntry>,
    stream: bool,
}

pub struct OllamaChatGateway {
    client: reqwest::Client,
    api_url: String,
    system_prompt: String,
}

impl OllamaChatGateway {
    pub fn new(api_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, GatewayError> {
        // No overall timeout: a streamed reply may legitimately run for minutes
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| GatewayError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    pub fn from_config(config: &FileChatConfig) -> Result<Self, GatewayError> {
        let gateway = Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        Ok(match &config.system_prompt {
            Some(prompt) => gateway.with_system_prompt(prompt.clone()),
            None => gateway,
        })
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn wire_request<'a>(&self, request: &'a ChatRequest) -> WireRequest<'a> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(HistoryEntry::system(self.system_prompt.clone()));
        messages.extend(request.messages());
        WireRequest {
            model: &request.model,
            messages,
            stream: true,
        }
    }
}

#[async_trait]
impl ChatGateway for OllamaChatGateway {
    async fn send_chat(&self, request: ChatRequest) -> Result<ChunkStream, GatewayError> {
        debug!(
            "POST {} (model {}, {} history entries)",
            self.api_url,
            request.model,
            request.history.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .json(&self.wire_request(&request))
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }
        if response.content_length() == Some(0) {
            return Err(GatewayError::MissingBody);
        }

        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let mut body = response.bytes_stream();
        tokio::spawn(async move {
            while let Some(chunk) = body.next().await {
                let item = chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| GatewayError::StreamInterrupted(e.to_string()));
                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!("Chat stream consumer went away; dropping response");
                    return;
                }
                if failed {
                    warn!("Chat stream interrupted");
                    return;
                }
            }
        });

        Ok(ChunkStream::new(rx))
    }
}
