//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, loads configuration and
//! dispatches to the interactive chat loop or one of the one-shot commands.

pub mod chat;
pub mod export;
pub mod say;

#[cfg(test)]
mod tests;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::chat_stream::{create_client, ClientInitError, OpenAiClient};
use crate::core::config::{Config, ConfigOverrides, ResolvedConfig};
use crate::core::history::DEFAULT_HISTORY_DIR;
use crate::utils::logging;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "A console chat client for streaming OpenAI-compatible APIs")]
#[command(
    long_about = "Parley streams chat completions from any OpenAI-compatible endpoint to the \
terminal, showing the model's reasoning separately from its answer. Conversations can be \
saved as JSON (and resumed later) or exported to Markdown with images written alongside.\n\n\
Configuration:\n\
  Settings are read from config.toml in the platform config directory, or from --config.\n\n\
Environment Variables (fallback if not configured):\n\
  OPENAI_API_KEY    Your API key\n\
  OPENAI_BASE_URL   Custom API base URL (defaults to https://api.openai.com/v1)\n\
  RUST_LOG          Diagnostic log filter (overrides -v)\n\n\
Chat commands:\n\
  /image <path>     Attach an image to your next message\n\
  /save [path]      Save the conversation as JSON\n\
  /export [path]    Export the conversation as Markdown\n\
  /html [path]      Export the conversation as an HTML page\n\
  /quit             Save, export and leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Path to a config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for saved and exported conversations
    #[arg(long, global = true, value_name = "DIR")]
    pub history_dir: Option<PathBuf>,

    /// Print the answer only once it is complete
    #[arg(long, global = true)]
    pub no_live_print: bool,

    /// Increase diagnostic logging (-v, -vv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive conversation (default)
    Chat {
        /// Resume from a saved JSON history
        #[arg(long, value_name = "FILE")]
        load: Option<PathBuf>,
    },
    /// Send a single prompt and print the streamed reply
    Say {
        /// Prompt text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Attach an image to the prompt
        #[arg(long, value_name = "FILE")]
        image: Option<PathBuf>,
        /// Save the exchange as JSON and Markdown afterwards
        #[arg(long)]
        save: bool,
    },
    /// Convert a saved JSON history into a Markdown or HTML document
    Export {
        /// JSON history file
        input: PathBuf,
        /// Output path (defaults to the history directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Document format
        #[arg(long, value_enum, default_value_t = export::ExportFormat::Markdown)]
        format: export::ExportFormat,
    },
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.clone(),
            history_dir: self.history_dir.clone(),
            no_live_print: self.no_live_print,
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = Config::load(args.config.as_deref())?;
    let overrides = args.overrides();

    match args.command.unwrap_or(Commands::Chat { load: None }) {
        Commands::Chat { load } => {
            let resolved = config.resolve(&overrides)?;
            let client = connect(&resolved)?;
            chat::run_chat(client, resolved, load).await
        }
        Commands::Say {
            prompt,
            image,
            save,
        } => {
            let resolved = config.resolve(&overrides)?;
            let client = connect(&resolved)?;
            say::run_say(&client, &resolved, prompt, image, save).await
        }
        Commands::Export {
            input,
            output,
            format,
        } => {
            let history_dir = overrides
                .history_dir
                .or(config.history_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR));
            export::run_export(&input, output.as_deref(), &history_dir, format)
        }
    }
}

fn connect(resolved: &ResolvedConfig) -> Result<OpenAiClient, Box<dyn Error>> {
    create_client(&resolved.base_url, &resolved.api_key).map_err(|err| {
        if matches!(err, ClientInitError::MissingApiKey) {
            eprintln!("💡 Set `api_key` in the config file or export OPENAI_API_KEY.");
        }
        Box::new(err) as Box<dyn Error>
    })
}
