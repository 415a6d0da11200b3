//! Saving and loading conversations.
//!
//! - [`json`] is the lossless format; [`load_json`] reads it back.
//! - [`markdown`] and [`html`] are one-way exports for people, with images
//!   written out as sibling files.
//! - [`paths`] names files written without an explicit destination.

pub mod html;
pub mod json;
pub mod markdown;
pub mod paths;


use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::message::{Conversation, MessageError};

pub use html::write_html;
pub use json::{try_load_json, write_json};
pub use markdown::{assets_dir_name, write_markdown};
pub use paths::{default_file_stem, HistoryDir, DEFAULT_HISTORY_DIR};

/// Errors raised while writing history files.
#[derive(Debug)]
pub enum PersistError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(serde_json::Error),
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            PersistError::Serialize(err) => write!(f, "failed to serialize history: {err}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io { source, .. } => Some(source),
            PersistError::Serialize(err) => Some(err),
        }
    }
}

/// Errors raised while reading a history file. [`load_json`] downgrades all
/// of them to an empty conversation.
#[derive(Debug)]
pub enum LoadError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Message `index` has an unknown role or breaks the image rule.
    Message { index: usize, source: MessageError },
    /// Message `index` carries image data that cannot be decoded.
    Image { index: usize, reason: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            LoadError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
            LoadError::Message { index, source } => write!(f, "message {index}: {source}"),
            LoadError::Image { index, reason } => {
                write!(f, "message {index}: invalid image data: {reason}")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Read { source, .. } => Some(source),
            LoadError::Parse { source, .. } => Some(source),
            LoadError::Message { source, .. } => Some(source),
            LoadError::Image { .. } => None,
        }
    }
}

/// Loads a history file, returning an empty conversation if the file is
/// missing or unreadable.
pub fn load_json(path: &Path) -> Conversation {
    if !path.exists() {
        debug!(path = %path.display(), "no history file");
        return Conversation::new();
    }

    match try_load_json(path) {
        Ok(conversation) => {
            info!(path = %path.display(), messages = conversation.len(), "history loaded");
            conversation
        }
        Err(err) => {
            warn!("{err}; starting with an empty conversation");
            Conversation::new()
        }
    }
}

fn create_parent_dir(path: &Path) -> Result<(), PersistError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| PersistError::io(dir, source))
        }
        _ => Ok(()),
    }
}

impl HistoryDir {
    /// Saves as JSON to `path`, or to a generated name in this directory.
    pub fn save_json(
        &self,
        conversation: &Conversation,
        path: Option<&Path>,
    ) -> Result<PathBuf, PersistError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_path(conversation, "json"),
        };
        write_json(conversation, &path)?;
        info!(path = %path.display(), "conversation saved");
        Ok(path)
    }

    /// Exports as Markdown to `path`, or to a generated name in this directory.
    pub fn export_markdown(
        &self,
        conversation: &Conversation,
        path: Option<&Path>,
    ) -> Result<PathBuf, PersistError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_path(conversation, "md"),
        };
        write_markdown(conversation, &path)?;
        info!(path = %path.display(), "conversation exported");
        Ok(path)
    }

    /// Exports as a standalone HTML page to `path`, or to a generated name in
    /// this directory.
    pub fn export_html(
        &self,
        conversation: &Conversation,
        path: Option<&Path>,
    ) -> Result<PathBuf, PersistError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_path(conversation, "html"),
        };
        write_html(conversation, &path)?;
        info!(path = %path.display(), "conversation exported");
        Ok(path)
    }

    /// Saves JSON and exports Markdown under one generated stem. Returns the
    /// `(json, markdown)` paths.
    pub fn archive(&self, conversation: &Conversation) -> Result<(PathBuf, PathBuf), PersistError> {
        let stem = default_file_stem(conversation, chrono::Local::now().naive_local());
        self.archive_as(conversation, &stem)
    }

    fn archive_as(
        &self,
        conversation: &Conversation,
        stem: &str,
    ) -> Result<(PathBuf, PathBuf), PersistError> {
        let stem = self.free_stem(stem, &["json", "md"]);
        let json_path = self.root().join(format!("{stem}.json"));
        let markdown_path = self.root().join(format!("{stem}.md"));
        self.save_json(conversation, Some(&json_path))?;
        self.export_markdown(conversation, Some(&markdown_path))?;
        Ok((json_path, markdown_path))
    }
}
