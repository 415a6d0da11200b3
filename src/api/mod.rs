use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::message::{ContentPart, Message};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: ChatContent,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatImageUrl {
    pub url: String,
}

impl ChatMessage {
    /// Converts a stored message into its wire form. Roles that are never sent
    /// (reasoning traces) yield `None`.
    pub fn from_message(message: &Message) -> Option<Self> {
        let role = message.role.to_api_role()?;
        let content = match message.content.as_slice() {
            [] => ChatContent::Text(String::new()),
            [ContentPart::Text(text)] => ChatContent::Text(text.clone()),
            parts => ChatContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => ChatContentPart::Text { text: text.clone() },
                        ContentPart::Image(image) => ChatContentPart::ImageUrl {
                            image_url: ChatImageUrl {
                                url: image.to_data_url(),
                            },
                        },
                    })
                    .collect(),
            ),
        };
        Some(Self { role, content })
    }
}

pub fn to_api_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().filter_map(ChatMessage::from_message).collect()
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ChatResponseDelta {
    /// Reasoning text, whichever field the provider uses for it.
    pub fn reasoning_text(&self) -> Option<&str> {
        self.reasoning_content
            .as_deref()
            .or(self.reasoning.as_deref())
    }
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}
