use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::core::message::{ContentPart, Conversation};

pub const DEFAULT_HISTORY_DIR: &str = "chat_history";

const UNTITLED: &str = "untitled";
const PREFIX_CHARS: usize = 10;
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// File stem for an unnamed history file: a short prefix taken from the first
/// user text, then the timestamp.
pub fn default_file_stem(conversation: &Conversation, timestamp: NaiveDateTime) -> String {
    let prefix = first_user_text(conversation)
        .map(|text| text.chars().take(PREFIX_CHARS).collect::<String>())
        .map(|prefix| sanitize(&prefix))
        .filter(|prefix| !prefix.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    format!("{}_{}", prefix, timestamp.format(TIMESTAMP_FORMAT))
}

fn first_user_text(conversation: &Conversation) -> Option<&str> {
    conversation
        .iter()
        .filter(|msg| msg.role.is_user())
        .flat_map(|msg| msg.content.iter())
        .filter_map(ContentPart::as_text)
        .map(str::trim)
        .find(|text| !text.is_empty())
}

fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Directory that receives history files written without an explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDir {
    root: PathBuf,
}

impl Default for HistoryDir {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DIR)
    }
}

impl HistoryDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<stem>.<extension>`, or the first free `<stem>-<n>.<extension>`.
    pub fn resolve(&self, stem: &str, extension: &str) -> PathBuf {
        let stem = self.free_stem(stem, &[extension]);
        self.root.join(format!("{stem}.{extension}"))
    }

    /// `stem`, or the first `<stem>-<n>`, that is free under every one of
    /// `extensions`.
    pub fn free_stem(&self, stem: &str, extensions: &[&str]) -> String {
        let is_free = |candidate: &str| {
            extensions
                .iter()
                .all(|ext| !self.root.join(format!("{candidate}.{ext}")).exists())
        };
        if is_free(stem) {
            return stem.to_string();
        }

        (1u32..)
            .map(|n| format!("{stem}-{n}"))
            .find(|candidate| is_free(candidate))
            .unwrap_or_else(|| stem.to_string())
    }

    pub fn default_path(&self, conversation: &Conversation, extension: &str) -> PathBuf {
        let timestamp = chrono::Local::now().naive_local();
        self.resolve(&default_file_stem(conversation, timestamp), extension)
    }
}
