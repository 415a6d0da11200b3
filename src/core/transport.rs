//! The streaming capability the exchange engine talks to.
//!
//! A transport turns a conversation into an ordered stream of tagged
//! fragments terminated by [`StreamMessage::End`]. The HTTP implementation
//! lives in [`crate::core::chat_stream`]; tests use in-memory streams.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Reasoning,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub channel: Channel,
    pub text: String,
}

impl Fragment {
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            channel: Channel::Reasoning,
            text: text.into(),
        }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            channel: Channel::Answer,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Fragment(Fragment),
    Error(String),
    End,
}

pub type FragmentStream = BoxStream<'static, StreamMessage>;

/// Extra request parameters passed through to the endpoint untouched
/// (temperature, top_p, provider-specific switches, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestOptions(Map<String, Value>);

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RequestOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub struct StreamRequest<'a> {
    pub messages: &'a [Message],
    pub model: &'a str,
    pub options: &'a RequestOptions,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<FragmentStream, StreamError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The request could not be sent or the endpoint refused it.
    Open(String),

    /// The endpoint reported an error inside the stream.
    Api(String),

    /// The stream ended before the completion signal.
    Interrupted,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Open(err) => write!(f, "failed to open stream: {err}"),
            StreamError::Api(err) => f.write_str(err),
            StreamError::Interrupted => f.write_str("stream ended before completion"),
        }
    }
}

impl std::error::Error for StreamError {}
