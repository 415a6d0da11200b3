//! Offline conversion of saved histories into documents.

use std::error::Error;
use std::path::Path;

use clap::ValueEnum;

use crate::core::config::data::path_display;
use crate::core::history::{try_load_json, HistoryDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[value(alias = "md")]
    Markdown,
    Html,
}

/// Reads `input` strictly and writes it to `output`, or next to the other
/// generated files in `history_dir`.
pub fn run_export(
    input: &Path,
    output: Option<&Path>,
    history_dir: &Path,
    format: ExportFormat,
) -> Result<(), Box<dyn Error>> {
    let conversation = try_load_json(input)?;
    if conversation.is_empty() {
        return Err(format!("{} holds no messages", path_display(input)).into());
    }

    let history = HistoryDir::new(history_dir);
    let exported = match format {
        ExportFormat::Markdown => history.export_markdown(&conversation, output)?,
        ExportFormat::Html => history.export_html(&conversation, output)?,
    };
    println!("📝 Exported to {}", path_display(&exported));
    Ok(())
}
