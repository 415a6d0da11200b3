//! Standalone HTML export.
//!
//! User and assistant text is rendered from Markdown with `pulldown-cmark`;
//! system and reasoning turns are folded into `<details>` boxes. Images go
//! to the same `<stem>.assets/` directory the Markdown export uses.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use pulldown_cmark::{html, Options, Parser};

use super::markdown::{folded_summary, folded_text, role_emoji, AssetWriter};
use super::{create_parent_dir, PersistError};
use crate::core::message::{ContentPart, Conversation, Message};

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Conversation</title>
<style>
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Noto Sans", sans-serif, "Noto Color Emoji"; background: #f0f2f5; color: #333; margin: 0; padding: 20px; }
.chat { max-width: 800px; margin: 0 auto; background: #fff; border-radius: 12px; box-shadow: 0 4px 12px rgba(0, 0, 0, 0.1); overflow: hidden; }
.chat-header { background: #0d6efd; color: #fff; padding: 20px; text-align: center; font-size: 1.5em; font-weight: bold; }
.chat-body { padding: 20px; }
.message { display: flex; margin-bottom: 20px; align-items: flex-start; }
.message.user { justify-content: flex-end; }
.message.folded { justify-content: center; }
.avatar { width: 40px; height: 40px; border-radius: 50%; display: flex; align-items: center; justify-content: center; font-size: 1.6em; flex-shrink: 0; }
.message.user .avatar { order: 2; margin-left: 12px; background: #0d6efd; }
.message.assistant .avatar { margin-right: 12px; background: #198754; }
.content { max-width: 70%; padding: 12px 18px; border-radius: 18px; }
.message.user .content { background: #e7f0ff; border-top-right-radius: 4px; order: 1; }
.message.assistant .content { background: #f1f1f1; border-top-left-radius: 4px; }
.role-name { font-weight: bold; font-size: 0.85em; margin-bottom: 4px; }
.content img { max-width: 100%; border-radius: 8px; margin-top: 10px; }
.content pre { background: #282c34; color: #abb2bf; padding: 1em; border-radius: 8px; overflow-x: auto; }
.content :not(pre) > code { background: #e9eaec; color: #c7254e; padding: 2px 4px; border-radius: 4px; }
details { width: 100%; border: 1px solid #e0e0e0; border-radius: 8px; background: #fafafa; }
details summary { cursor: pointer; padding: 12px; font-weight: bold; }
details pre { margin: 0; padding: 0 15px 15px; white-space: pre-wrap; word-wrap: break-word; color: #555; }
</style>
</head>
<body>
<div class="chat">
<div class="chat-header">Conversation</div>
<div class="chat-body">
"#;

const PAGE_TAIL: &str = "</div>\n</div>\n</body>\n</html>\n";

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn render_markdown(out: &mut String, text: &str) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    html::push_html(out, Parser::new_ext(text, options));
}

fn render_message(
    out: &mut String,
    message: &Message,
    assets: &mut AssetWriter,
) -> Result<(), PersistError> {
    let emoji = role_emoji(message.role);

    if let Some(summary) = folded_summary(message.role) {
        out.push_str(&format!(
            "<div class=\"message folded\"><details><summary>{emoji} {summary}</summary><pre>{}</pre></details></div>\n",
            escape_html(&folded_text(message))
        ));
        return Ok(());
    }

    out.push_str(&format!(
        "<div class=\"message {}\"><div class=\"avatar\">{emoji}</div><div class=\"content\"><div class=\"role-name\">{}</div>\n",
        message.role.as_str(),
        message.role.title()
    ));
    for part in &message.content {
        match part {
            ContentPart::Text(text) => render_markdown(out, text),
            ContentPart::Image(image) => {
                let link = assets.write(image)?;
                out.push_str(&format!(
                    "<img src=\"{}\" alt=\"attached image\">\n",
                    escape_html(&link)
                ));
            }
        }
    }
    out.push_str("</div></div>\n");
    Ok(())
}

/// Renders `conversation` to `path` as a self-contained page, writing any
/// images into the sibling assets directory.
pub fn write_html(conversation: &Conversation, path: &Path) -> Result<(), PersistError> {
    create_parent_dir(path)?;

    let mut assets = AssetWriter::for_document(path);
    let mut out = String::from(PAGE_HEAD);
    for message in conversation {
        render_message(&mut out, message, &mut assets)?;
    }
    out.push_str(PAGE_TAIL);

    let file = File::create(path).map_err(|source| PersistError::io(path, source))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(out.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|source| PersistError::io(path, source))
}
