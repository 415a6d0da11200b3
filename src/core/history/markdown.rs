//! Human-readable Markdown export.
//!
//! Images are written next to the document in `<stem>.assets/` and linked
//! relatively. There is no loader for this format.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{create_parent_dir, PersistError};
use crate::core::image::ImagePart;
use crate::core::message::{ContentPart, Conversation, Message, Role};

pub(super) fn role_emoji(role: Role) -> &'static str {
    match role {
        Role::System => "⚙️",
        Role::User => "👤",
        Role::Assistant => "🤖",
        Role::Reasoning => "📝",
    }
}

/// Summary line for roles whose text is folded away by default.
pub(super) fn folded_summary(role: Role) -> Option<&'static str> {
    match role {
        Role::System => Some("System prompt"),
        Role::Reasoning => Some("Reasoning"),
        Role::User | Role::Assistant => None,
    }
}

/// Text of a folded message with blank lines dropped.
pub(super) fn folded_text(message: &Message) -> String {
    message
        .text_content()
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn assets_dir_name(document: &Path) -> String {
    let stem = document
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "conversation".to_string());
    format!("{stem}.assets")
}

pub(super) struct AssetWriter {
    dir: PathBuf,
    link_prefix: String,
    next_index: usize,
}

impl AssetWriter {
    pub(super) fn for_document(document: &Path) -> Self {
        let name = assets_dir_name(document);
        let dir = match document.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(&name),
            _ => PathBuf::from(&name),
        };
        Self {
            dir,
            link_prefix: name,
            next_index: 0,
        }
    }

    /// Writes the image and returns its link relative to the document.
    pub(super) fn write(&mut self, image: &ImagePart) -> Result<String, PersistError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistError::io(&self.dir, source))?;

        let file_name = format!("image_{}.{}", self.next_index, extension_for(image));
        let path = self.dir.join(&file_name);
        fs::write(&path, &image.data).map_err(|source| PersistError::io(&path, source))?;
        self.next_index += 1;

        Ok(format!("{}/{}", self.link_prefix, file_name))
    }
}

fn extension_for(image: &ImagePart) -> String {
    let ext: String = image
        .media_subtype
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

fn link_target(link: &str) -> String {
    if link.chars().any(char::is_whitespace) {
        format!("<{link}>")
    } else {
        link.to_string()
    }
}

fn render_message(
    out: &mut String,
    message: &Message,
    assets: &mut AssetWriter,
) -> Result<(), PersistError> {
    out.push_str(&format!(
        "## {} {}\n\n",
        role_emoji(message.role),
        message.role.title()
    ));

    if let Some(summary) = folded_summary(message.role) {
        let cleaned = folded_text(message);
        out.push_str(&format!(
            "<details>\n<summary>{summary}</summary>\n{cleaned}\n</details>\n\n"
        ));
    } else {
        for part in &message.content {
            match part {
                ContentPart::Text(text) => {
                    out.push_str(text);
                    out.push_str("\n\n");
                }
                ContentPart::Image(image) => {
                    let link = assets.write(image)?;
                    out.push_str(&format!("![image]({})\n\n", link_target(&link)));
                }
            }
        }
    }

    out.push_str("---\n\n");
    Ok(())
}

/// Renders `conversation` to `path`, writing any images into the sibling
/// assets directory.
pub fn write_markdown(conversation: &Conversation, path: &Path) -> Result<(), PersistError> {
    create_parent_dir(path)?;

    let mut assets = AssetWriter::for_document(path);
    let mut out = String::from("# Conversation\n\n");
    for message in conversation {
        render_message(&mut out, message, &mut assets)?;
    }

    let file = File::create(path).map_err(|source| PersistError::io(path, source))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(out.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|source| PersistError::io(path, source))
}
