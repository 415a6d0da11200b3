//! Lossless JSON form of a conversation.
//!
//! ```json
//! [
//!     { "role": "system", "content": "be brief" },
//!     { "role": "user", "content": [
//!         { "type": "text", "value": "what is this?" },
//!         { "type": "image", "media_subtype": "png", "data": "iVBORw0..." }
//!     ] }
//! ]
//! ```
//!
//! Files written in the OpenAI request shape (`text` / `image_url` parts with
//! `data:` URLs) are accepted on load as well.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use super::{create_parent_dir, LoadError, PersistError};
use crate::core::image::ImagePart;
use crate::core::message::{ContentPart, Conversation, Message, Role};

#[derive(Serialize, Deserialize)]
struct PersistedMessage {
    role: String,
    content: PersistedContent,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PersistedContent {
    Text(String),
    Parts(Vec<PersistedPart>),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PersistedPart {
    Text {
        #[serde(alias = "text")]
        value: String,
    },
    Image {
        media_subtype: String,
        data: String,
    },
    #[serde(skip_serializing)]
    ImageUrl { image_url: PersistedImageUrl },
}

#[derive(Deserialize)]
struct PersistedImageUrl {
    url: String,
}

impl From<&Message> for PersistedMessage {
    fn from(message: &Message) -> Self {
        let content = match message.content.as_slice() {
            [] => PersistedContent::Text(String::new()),
            [ContentPart::Text(text)] if !text.is_empty() => PersistedContent::Text(text.clone()),
            parts => PersistedContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => PersistedPart::Text {
                            value: text.clone(),
                        },
                        ContentPart::Image(image) => PersistedPart::Image {
                            media_subtype: image.media_subtype.clone(),
                            data: image.encode_base64(),
                        },
                    })
                    .collect(),
            ),
        };

        Self {
            role: message.role.as_str().to_string(),
            content,
        }
    }
}

impl PersistedMessage {
    fn into_message(self, index: usize) -> Result<Message, LoadError> {
        let role = Role::try_from(self.role.as_str())
            .map_err(|source| LoadError::Message { index, source })?;

        let content = match self.content {
            PersistedContent::Text(text) if text.is_empty() => Vec::new(),
            PersistedContent::Text(text) => vec![ContentPart::Text(text)],
            PersistedContent::Parts(parts) => parts
                .into_iter()
                .map(|part| part.into_content(index))
                .collect::<Result<Vec<_>, _>>()?,
        };

        Message::with_parts(role, content).map_err(|source| LoadError::Message { index, source })
    }
}

impl PersistedPart {
    fn into_content(self, index: usize) -> Result<ContentPart, LoadError> {
        match self {
            PersistedPart::Text { value } => Ok(ContentPart::Text(value)),
            PersistedPart::Image {
                media_subtype,
                data,
            } => ImagePart::from_base64(media_subtype, &data)
                .map(ContentPart::Image)
                .map_err(|err| LoadError::Image {
                    index,
                    reason: err.to_string(),
                }),
            PersistedPart::ImageUrl { image_url } => ImagePart::from_data_url(&image_url.url)
                .map(ContentPart::Image)
                .ok_or_else(|| LoadError::Image {
                    index,
                    reason: "image URL is not an embedded base64 data URL".to_string(),
                }),
        }
    }
}

/// Writes `conversation` to `path` as pretty-printed JSON.
pub fn write_json(conversation: &Conversation, path: &Path) -> Result<(), PersistError> {
    create_parent_dir(path)?;

    let persisted: Vec<PersistedMessage> = conversation.iter().map(PersistedMessage::from).collect();

    let file = File::create(path).map_err(|source| PersistError::io(path, source))?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    persisted
        .serialize(&mut serializer)
        .map_err(PersistError::Serialize)?;
    writeln!(writer).map_err(|source| PersistError::io(path, source))?;
    writer
        .flush()
        .map_err(|source| PersistError::io(path, source))?;
    Ok(())
}

pub fn try_load_json(path: &Path) -> Result<Conversation, LoadError> {
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json(&contents).map_err(|err| match err {
        ParseFailure::Syntax(source) => LoadError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Load(err) => err,
    })
}

enum ParseFailure {
    Syntax(serde_json::Error),
    Load(LoadError),
}

fn parse_json(contents: &str) -> Result<Conversation, ParseFailure> {
    let persisted: Vec<PersistedMessage> =
        serde_json::from_str(contents).map_err(ParseFailure::Syntax)?;

    persisted
        .into_iter()
        .enumerate()
        .map(|(index, message)| message.into_message(index))
        .collect::<Result<Vec<_>, _>>()
        .map(Conversation::from)
        .map_err(ParseFailure::Load)
}
