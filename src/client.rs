//! Streaming chat-completions client.
//!
//! Posts the conversation history (with the annotation system prompt
//! prepended) to an OpenAI-compatible endpoint with `stream: true`, reads
//! the response body incrementally, and feeds each byte chunk through
//! [`SseDecoder`]. The caller observes the answer through a single event
//! callback; cancellation is a shared flag checked per chunk and treated as
//! a non-error termination.
//!
//! At most one streamed answer should be in flight per conversation; the
//! client does not guard against concurrent submission, the surrounding
//! driver is responsible for serializing turns.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;
use crate::stream::{SseDecoder, SseEvent};

/// Configuration for the chat-completions client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// Opaque credential supplied by the key-management layer.
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o".into(),
            api_key: String::new(),
            temperature: 1.0,
            timeout_secs: 300,
        }
    }
}

/// A chat message on the wire.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// "system", "user", or "assistant".
    pub role: &'static str,
    pub content: String,
}

/// Events delivered to the streaming callback, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Fired exactly once, before the first non-empty delta.
    FirstToken,
    /// One non-empty text fragment.
    Delta(String),
}

/// Shared cancellation handle for an in-flight answer.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination of the outstanding read loop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Client for an OpenAI-compatible streaming chat endpoint.
pub struct ChatClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Stream one answer for the given history.
    ///
    /// `history` is the conversation so far, most recent user message last;
    /// the annotation system prompt is prepended here. Events are delivered
    /// in order; cancellation terminates the loop without error. The
    /// flushed decoder tail is processed before returning.
    pub fn stream_chat(
        &self,
        history: &[ChatMessage],
        cancel: &CancelToken,
        mut on_event: impl FnMut(StreamEvent),
    ) -> Result<(), LlmError> {
        if self.config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": crate::prompt::QA_SYSTEM_PROMPT,
        })];
        messages.extend(
            history
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content })),
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": true,
        });

        tracing::debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            turns = history.len(),
            "starting streamed completion"
        );

        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| match e {
                ureq::Error::Status(status, _) => LlmError::HttpStatus { status },
                ureq::Error::Transport(t) => LlmError::RequestFailed {
                    message: t.to_string(),
                },
            })?;

        let mut reader = response.into_reader();
        let mut decoder = SseDecoder::new();
        let mut first = true;
        let mut chunk = [0u8; 8192];

        loop {
            if cancel.is_cancelled() {
                tracing::debug!("stream cancelled by caller");
                return Ok(());
            }
            let n = reader
                .read(&mut chunk)
                .map_err(|source| LlmError::StreamRead { source })?;
            if n == 0 {
                break;
            }
            for event in decoder.push(&chunk[..n]) {
                deliver(event, &mut first, &mut on_event);
            }
            if decoder.is_done() {
                return Ok(());
            }
        }

        for event in decoder.finish() {
            deliver(event, &mut first, &mut on_event);
        }
        Ok(())
    }
}

fn deliver(event: SseEvent, first: &mut bool, on_event: &mut impl FnMut(StreamEvent)) {
    match event {
        SseEvent::Delta(text) => {
            if *first {
                on_event(StreamEvent::FirstToken);
                *first = false;
            }
            on_event(StreamEvent::Delta(text));
        }
        SseEvent::Done => {}
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish()
    }
}
