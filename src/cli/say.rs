//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::core::config::data::path_display;
use crate::core::config::ResolvedConfig;
use crate::core::exchange::{exchange, ExchangeResult, StreamCallbacks};
use crate::core::history::HistoryDir;
use crate::core::message::{Conversation, Role};
use crate::core::transport::ChatTransport;

/// Builds the conversation for a single prompt: the configured system prompt
/// (if any) followed by the user turn.
pub fn prompt_conversation(
    config: &ResolvedConfig,
    prompt: &str,
    image: Option<&std::path::Path>,
) -> Result<Conversation, Box<dyn Error>> {
    let mut conversation = Conversation::new();
    if let Some(system_prompt) = config.system_prompt.as_deref() {
        conversation.add_message(Role::System, system_prompt, None)?;
    }
    conversation.add_message(Role::User, prompt, image)?;
    Ok(conversation)
}

pub async fn run_say<T>(
    transport: &T,
    config: &ResolvedConfig,
    prompt: Vec<String>,
    image: Option<PathBuf>,
    save: bool,
) -> Result<(), Box<dyn Error>>
where
    T: ChatTransport + ?Sized,
{
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() && image.is_none() {
        return Err("Usage: parley say <prompt>".into());
    }

    let mut conversation = prompt_conversation(config, &prompt, image.as_deref())?;

    let callbacks = if config.live_print {
        StreamCallbacks::new().live_print_stdout()
    } else {
        StreamCallbacks::new()
    };
    let ExchangeResult { answer, reasoning } = exchange(
        transport,
        &conversation,
        &config.model,
        &config.options,
        callbacks,
    )
    .await?;

    if !config.live_print {
        let mut stdout = io::stdout();
        writeln!(stdout, "{answer}")?;
        stdout.flush()?;
    }

    if save {
        conversation.record_exchange(&answer, &reasoning);
        let (json, markdown) = HistoryDir::new(&config.history_dir).archive(&conversation)?;
        eprintln!("💾 Saved to {}", path_display(&json));
        eprintln!("📝 Exported to {}", path_display(&markdown));
    }

    Ok(())
}
