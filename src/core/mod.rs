pub mod chat_stream;
pub mod config;
pub mod exchange;
pub mod history;
pub mod image;
pub mod message;
pub mod transport;
