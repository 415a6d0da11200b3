use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::image::{self, ImagePart};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
    /// Reasoning trace of an earlier assistant turn. Kept in history only.
    Reasoning,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::System, Role::User, Role::Assistant, Role::Reasoning];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Reasoning => "reasoning",
        }
    }

    /// Role name used on the wire, or `None` for roles that are never sent.
    pub fn to_api_role(self) -> Option<&'static str> {
        match self {
            Role::System => Some("system"),
            Role::User => Some("user"),
            Role::Assistant => Some("assistant"),
            Role::Reasoning => None,
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    /// Capitalized label for document headers.
    pub fn title(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Reasoning => "Reasoning",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = MessageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            // Older history files label reasoning turns "thinking".
            "reasoning" | "thinking" => Ok(Role::Reasoning),
            other => Err(MessageError::InvalidRole(other.to_string())),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::try_from(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImagePart),
}

impl ContentPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Image(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Text-only message. Empty text produces a message with no parts.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentPart::Text(text)]
        };
        Self { role, content }
    }

    /// Builds a message from raw parts, enforcing the user-only image rule.
    pub fn with_parts(role: Role, content: Vec<ContentPart>) -> Result<Self, MessageError> {
        if !role.is_user() && content.iter().any(|part| matches!(part, ContentPart::Image(_))) {
            return Err(MessageError::ImageRoleViolation(role));
        }
        Ok(Self { role, content })
    }

    /// All text parts joined with blank lines.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImagePart> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::Image(image) => Some(image),
            ContentPart::Text(_) => None,
        })
    }

    pub fn has_image(&self) -> bool {
        self.images().next().is_some()
    }
}

/// Errors raised while building a message. The conversation is left untouched.
#[derive(Debug)]
pub enum MessageError {
    /// The role string is not one of system, user, assistant or reasoning.
    InvalidRole(String),

    /// An image was attached to a message whose role is not `user`.
    ImageRoleViolation(Role),

    /// The image file could not be read.
    AssetRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::InvalidRole(role) => write!(f, "invalid message role: {role}"),
            MessageError::ImageRoleViolation(role) => write!(
                f,
                "images can only be attached to user messages (got {role})"
            ),
            MessageError::AssetRead { path, source } => {
                write!(f, "failed to read image {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for MessageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MessageError::AssetRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Accepts both role strings and already-typed roles in `add_message`.
pub trait IntoRole {
    fn into_role(self) -> Result<Role, MessageError>;
}

impl IntoRole for Role {
    fn into_role(self) -> Result<Role, MessageError> {
        Ok(self)
    }
}

impl IntoRole for &str {
    fn into_role(self) -> Result<Role, MessageError> {
        Role::try_from(self)
    }
}

impl IntoRole for &String {
    fn into_role(self) -> Result<Role, MessageError> {
        Role::try_from(self.as_str())
    }
}

/// An ordered, append-only conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn has_user_turn(&self) -> bool {
        self.messages.iter().any(|msg| msg.role.is_user())
    }

    /// Validates and appends a message, optionally with an image read from disk.
    pub fn add_message(
        &mut self,
        role: impl IntoRole,
        text: &str,
        image_path: Option<&Path>,
    ) -> Result<(), MessageError> {
        let role = role.into_role()?;

        let message = match image_path {
            Some(path) => {
                if !role.is_user() {
                    return Err(MessageError::ImageRoleViolation(role));
                }
                let image = image::read_image(path).map_err(|source| MessageError::AssetRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                let mut content = Vec::with_capacity(2);
                if !text.is_empty() {
                    content.push(ContentPart::Text(text.to_string()));
                }
                content.push(ContentPart::Image(image));
                debug!(role = %role, image = %path.display(), "added image message");
                Message { role, content }
            }
            None => {
                debug!(role = %role, preview = %preview(text), "added text message");
                Message::text(role, text)
            }
        };

        self.messages.push(message);
        Ok(())
    }

    /// Appends the outcome of an exchange: the reasoning trace (when the model
    /// produced one) followed by the answer.
    pub fn record_exchange(&mut self, answer: &str, reasoning: &str) {
        if !reasoning.is_empty() {
            self.messages.push(Message::text(Role::Reasoning, reasoning));
        }
        self.messages.push(Message::text(Role::Assistant, answer));
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

fn preview(text: &str) -> String {
    text.replace('\n', " ").chars().take(20).collect()
}
