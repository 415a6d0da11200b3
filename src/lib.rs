//! Parley is a console chat client for OpenAI-compatible streaming APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation model, the streaming transport and the
//!   exchange engine that splits a reply into reasoning and answer channels,
//!   plus history persistence and configuration.
//! - [`api`] defines the chat-completions payloads exchanged with the server.
//! - [`cli`] parses arguments and runs the interactive loop and one-shot
//!   commands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
