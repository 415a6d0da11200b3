use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{to_api_messages, ChatRequest, ChatResponse};
use crate::core::transport::{
    ChatTransport, Fragment, FragmentStream, StreamError, StreamMessage, StreamRequest,
};

/// Request keys owned by the client; extra options cannot override them.
const RESERVED_OPTION_KEYS: &[&str] = &["model", "messages", "stream"];

/// Errors raised while creating a client.
#[derive(Debug)]
pub enum ClientInitError {
    /// No API key, or a blank one, was supplied.
    MissingApiKey,

    /// The base URL is empty.
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be built.
    Http(reqwest::Error),
}

impl fmt::Display for ClientInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientInitError::MissingApiKey => f.write_str("API key must not be empty"),
            ClientInitError::InvalidBaseUrl(url) => write!(f, "invalid base URL: '{url}'"),
            ClientInitError::Http(err) => write!(f, "failed to create HTTP client: {err}"),
        }
    }
}

impl std::error::Error for ClientInitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientInitError::Http(err) => Some(err),
            _ => None,
        }
    }
}

/// Streaming client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Cancels the most recently opened stream. Replaced on every open.
    current_stream: Arc<Mutex<CancellationToken>>,
}

pub fn create_client(base_url: &str, api_key: &str) -> Result<OpenAiClient, ClientInitError> {
    if api_key.trim().is_empty() {
        return Err(ClientInitError::MissingApiKey);
    }
    if base_url.trim().is_empty() {
        return Err(ClientInitError::InvalidBaseUrl(base_url.to_string()));
    }

    let client = reqwest::Client::builder()
        .build()
        .map_err(ClientInitError::Http)?;

    Ok(OpenAiClient {
        client,
        base_url: base_url.trim().to_string(),
        api_key: api_key.trim().to_string(),
        current_stream: Arc::new(Mutex::new(CancellationToken::new())),
    })
}

impl OpenAiClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token that tears down the most recently opened stream when cancelled.
    /// The interrupted exchange then fails with [`StreamError::Interrupted`].
    /// Streams opened afterwards get their own token and are unaffected.
    pub fn abort_handle(&self) -> CancellationToken {
        self.current_stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn start_stream(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self
            .current_stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    fn build_request(&self, request: &StreamRequest<'_>) -> ChatRequest {
        let mut extra = request.options.as_map().clone();
        for key in RESERVED_OPTION_KEYS {
            if extra.remove(*key).is_some() {
                warn!(key = *key, "ignoring reserved request option");
            }
        }

        ChatRequest {
            model: request.model.to_string(),
            messages: to_api_messages(request.messages),
            stream: true,
            extra,
        }
    }
}

#[async_trait]
impl ChatTransport for OpenAiClient {
    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<FragmentStream, StreamError> {
        let body = self.build_request(&request);
        let chat_url = construct_api_url(&self.base_url, "chat/completions");
        debug!(url = %chat_url, model = %body.model, messages = body.messages.len(), "sending chat request");

        let response = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| StreamError::Open(format_api_error(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            warn!(%status, "chat request rejected");
            return Err(StreamError::Open(format_api_error(&error_text)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = self.start_stream();

        tokio::spawn(async move {
            tokio::select! {
                _ = pump_sse(response, &tx) => {}
                _ = cancel_token.cancelled() => {
                    debug!("stream aborted");
                }
            }
        });

        Ok(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
        .boxed())
    }
}

async fn pump_sse(response: reqwest::Response, tx: &mpsc::UnboundedSender<StreamMessage>) {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut state = SseState::default();

    while let Some(chunk) = stream.next().await {
        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send(StreamMessage::Error(format_api_error(&e.to_string())));
                return;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let line_str = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(s) => s.trim(),
                Err(e) => {
                    warn!("invalid UTF-8 in stream: {e}");
                    buffer.drain(..=newline_pos);
                    continue;
                }
            };

            let should_end = process_sse_line(line_str, tx, &mut state);
            buffer.drain(..=newline_pos);
            if should_end {
                return;
            }
        }

        if tx.is_closed() {
            return;
        }
    }

    // Some servers close the connection after the final choice without
    // sending `[DONE]`. Only a finished choice counts as completion.
    if state.finished {
        let _ = tx.send(StreamMessage::End);
    }
}

#[derive(Default)]
struct SseState {
    finished: bool,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(
    payload: &str,
    tx: &mpsc::UnboundedSender<StreamMessage>,
    state: &mut SseState,
) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(choice) = response.choices.first() {
                if let Some(reasoning) = choice.delta.reasoning_text() {
                    if !reasoning.is_empty() {
                        let _ = tx.send(StreamMessage::Fragment(Fragment::reasoning(reasoning)));
                    }
                }
                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() {
                        let _ = tx.send(StreamMessage::Fragment(Fragment::answer(content.clone())));
                    }
                }
                if choice.finish_reason.is_some() {
                    state.finished = true;
                }
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }

            let _ = tx.send(StreamMessage::Error(format_api_error(payload)));
            true
        }
    }
}

fn process_sse_line(
    line: &str,
    tx: &mpsc::UnboundedSender<StreamMessage>,
    state: &mut SseState,
) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, state))
        .unwrap_or(false)
}

fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API Error: {summary}");
            }
        }
        return format!("API Error: {json_value}");
    }

    format!("API Error: {trimmed}")
}
