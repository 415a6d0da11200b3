//! Line-oriented interactive chat loop.

use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

use crate::core::chat_stream::OpenAiClient;
use crate::core::config::data::path_display;
use crate::core::config::ResolvedConfig;
use crate::core::exchange::{exchange, StreamCallbacks};
use crate::core::history::{self, HistoryDir};
use crate::core::message::{Conversation, Role};
use crate::core::transport::ChatTransport;

/// One submitted line (or run of continued lines) from the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Send(String),
    Image(PathBuf),
    Save(Option<PathBuf>),
    Export(Option<PathBuf>),
    Html(Option<PathBuf>),
    Quit,
    Unknown(String),
}

fn optional_path(arg: &str) -> Option<PathBuf> {
    let arg = arg.trim();
    (!arg.is_empty()).then(|| PathBuf::from(arg))
}

pub fn parse_input(entry: &str) -> ChatInput {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }
    if !trimmed.starts_with('/') {
        return ChatInput::Send(entry.trim_end().to_string());
    }

    let (command, arg) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));
    match command {
        "/quit" | "/exit" => ChatInput::Quit,
        "/save" => ChatInput::Save(optional_path(arg)),
        "/export" => ChatInput::Export(optional_path(arg)),
        "/html" => ChatInput::Html(optional_path(arg)),
        "/image" => match optional_path(arg) {
            Some(path) => ChatInput::Image(path),
            None => ChatInput::Unknown("/image needs a file path".to_string()),
        },
        other => ChatInput::Unknown(format!("Unknown command: {other}")),
    }
}

/// Reads one entry, joining lines that end in a backslash. Returns `None` at
/// end of input when nothing was pending.
pub async fn read_entry<R>(lines: &mut Lines<R>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut entry = String::new();
    let mut continued = false;
    while let Some(line) = lines.next_line().await? {
        match line.strip_suffix('\\') {
            Some(head) => {
                entry.push_str(head);
                entry.push('\n');
                continued = true;
            }
            None => {
                entry.push_str(&line);
                return Ok(Some(entry));
            }
        }
    }
    Ok(continued.then_some(entry))
}

pub struct ChatSession<'a, T: ChatTransport + ?Sized> {
    transport: &'a T,
    config: &'a ResolvedConfig,
    history: HistoryDir,
    conversation: Conversation,
    pending_image: Option<PathBuf>,
}

impl<'a, T: ChatTransport + ?Sized> ChatSession<'a, T> {
    /// Starts from `conversation`, seeding the configured system prompt when
    /// the conversation is empty.
    pub fn new(transport: &'a T, config: &'a ResolvedConfig, mut conversation: Conversation) -> Self {
        if conversation.is_empty() {
            if let Some(prompt) = config.system_prompt.as_deref() {
                if let Err(err) = conversation.add_message(Role::System, prompt, None) {
                    warn!(%err, "could not add system prompt");
                }
            }
        }
        Self {
            transport,
            config,
            history: HistoryDir::new(&config.history_dir),
            conversation,
            pending_image: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn run<R>(&mut self, input: R, out: &mut dyn Write) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "👤 You: ")?;
            out.flush()?;
            let Some(entry) = read_entry(&mut lines).await? else {
                writeln!(out)?;
                break;
            };

            match parse_input(&entry) {
                ChatInput::Empty => {}
                ChatInput::Quit => break,
                ChatInput::Send(text) => self.send(&text, out).await?,
                ChatInput::Image(path) => self.attach(path, out)?,
                ChatInput::Save(path) => self.save(path.as_deref(), out)?,
                ChatInput::Export(path) => self.export(path.as_deref(), out)?,
                ChatInput::Html(path) => self.export_html(path.as_deref(), out)?,
                ChatInput::Unknown(message) => writeln!(out, "⚠️  {message}")?,
            }
        }
        self.finish(out)
    }

    /// Sends one user turn. The conversation only changes when the exchange
    /// completes.
    pub async fn send(&mut self, text: &str, out: &mut dyn Write) -> io::Result<()> {
        let mut pending = self.conversation.clone();
        let image = self.pending_image.take();
        if let Err(err) = pending.add_message(Role::User, text, image.as_deref()) {
            writeln!(out, "❌ {err}")?;
            return Ok(());
        }

        let callbacks = if self.config.live_print {
            StreamCallbacks::new().live_print(&mut *out)
        } else {
            StreamCallbacks::new()
        };
        let outcome = exchange(
            self.transport,
            &pending,
            &self.config.model,
            &self.config.options,
            callbacks,
        )
        .await;

        match outcome {
            Ok(result) => {
                if !self.config.live_print {
                    if !result.reasoning.is_empty() {
                        writeln!(out, "🤔 {}", result.reasoning)?;
                    }
                    writeln!(out, "🤖 Assistant: {}", result.answer)?;
                }
                pending.record_exchange(&result.answer, &result.reasoning);
                self.conversation = pending;
                debug!(messages = self.conversation.len(), "turn recorded");
            }
            Err(err) => {
                writeln!(out, "❌ {err}")?;
                self.pending_image = image;
            }
        }
        Ok(())
    }

    fn attach(&mut self, path: PathBuf, out: &mut dyn Write) -> io::Result<()> {
        if !path.is_file() {
            return writeln!(out, "❌ No such image: {}", path_display(&path));
        }
        writeln!(
            out,
            "📎 {} will be sent with your next message",
            path_display(&path)
        )?;
        self.pending_image = Some(path);
        Ok(())
    }

    fn save(&self, path: Option<&Path>, out: &mut dyn Write) -> io::Result<()> {
        match self.history.save_json(&self.conversation, path) {
            Ok(saved) => writeln!(out, "💾 Saved to {}", path_display(&saved)),
            Err(err) => writeln!(out, "❌ {err}"),
        }
    }

    fn export(&self, path: Option<&Path>, out: &mut dyn Write) -> io::Result<()> {
        match self.history.export_markdown(&self.conversation, path) {
            Ok(exported) => writeln!(out, "📝 Exported to {}", path_display(&exported)),
            Err(err) => writeln!(out, "❌ {err}"),
        }
    }

    fn export_html(&self, path: Option<&Path>, out: &mut dyn Write) -> io::Result<()> {
        match self.history.export_html(&self.conversation, path) {
            Ok(exported) => writeln!(out, "🌐 Exported to {}", path_display(&exported)),
            Err(err) => writeln!(out, "❌ {err}"),
        }
    }

    /// Writes both history files on the way out, unless nothing was said.
    fn finish(&self, out: &mut dyn Write) -> io::Result<()> {
        if !self.conversation.has_user_turn() {
            debug!("no user turns, nothing to save");
            return Ok(());
        }
        match self.history.archive(&self.conversation) {
            Ok((json, markdown)) => {
                writeln!(out, "💾 Saved to {}", path_display(&json))?;
                writeln!(out, "📝 Exported to {}", path_display(&markdown))
            }
            Err(err) => writeln!(out, "❌ {err}"),
        }
    }
}

pub async fn run_chat(
    client: OpenAiClient,
    config: ResolvedConfig,
    load: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let conversation = match load.as_deref() {
        Some(path) => history::load_json(path),
        None => Conversation::new(),
    };

    eprintln!("🚀 Starting Parley");
    eprintln!("📡 Using model: {}", config.model);
    eprintln!("🌐 API endpoint: {}", client.base_url());
    if !conversation.is_empty() {
        eprintln!("📂 Resumed {} messages", conversation.len());
    }
    eprintln!("💡 /image <path>, /save [path], /export [path], /html [path], /quit. End a line with \\ to continue it.");

    let mut session = ChatSession::new(&client, &config, conversation);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    session.run(stdin, &mut stdout).await?;
    Ok(())
}
