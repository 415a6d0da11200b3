use super::*;
use crate::cli::chat::{parse_input, read_entry, ChatInput, ChatSession};
use crate::core::history::{try_load_json, write_json};
use crate::core::message::{Conversation, Role};
use crate::core::transport::{RequestOptions, StreamError, StreamMessage};
use crate::utils::test_utils::{answer, reasoning, ScriptedTransport};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn resolved(history_dir: &Path) -> ResolvedConfig {
        ResolvedConfig {
            base_url: "http://localhost:1/v1".to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            system_prompt: None,
            history_dir: history_dir.to_path_buf(),
            live_print: false,
            options: RequestOptions::new(),
        }
    }

    pub(super) fn files_with_extension(dir: &Path, extension: &str) -> Vec<std::path::PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(extension))
            .collect()
    }

    pub(super) async fn run_session(
        transport: &ScriptedTransport,
        config: &ResolvedConfig,
        input: &str,
    ) -> (Conversation, String) {
        let mut session = ChatSession::new(transport, config, Conversation::new());
        let mut out = Vec::new();
        session
            .run(input.as_bytes(), &mut out)
            .await
            .expect("session should run");
        (
            session.conversation().clone(),
            String::from_utf8(out).expect("output is utf-8"),
        )
    }
}

use test_helpers::*;

#[test]
fn no_subcommand_defaults_to_chat() {
    let args = parse_args(&["parley"]);
    assert!(args.command.is_none());
    assert_eq!(args.verbose, 0);
}

#[test]
fn global_flags_parse_after_subcommand() {
    let args = parse_args(&[
        "parley",
        "chat",
        "--load",
        "old.json",
        "-m",
        "deepseek-reasoner",
        "-vv",
        "--no-live-print",
    ]);
    assert_eq!(args.model.as_deref(), Some("deepseek-reasoner"));
    assert_eq!(args.verbose, 2);
    assert!(args.no_live_print);
    match args.command {
        Some(Commands::Chat { load }) => assert_eq!(load, Some("old.json".into())),
        other => panic!("expected chat, got {other:?}"),
    }
}

#[test]
fn say_collects_prompt_words() {
    let args = parse_args(&["parley", "say", "--image", "cat.png", "what", "is", "this"]);
    match args.command {
        Some(Commands::Say {
            prompt,
            image,
            save,
        }) => {
            assert_eq!(prompt, vec!["what", "is", "this"]);
            assert_eq!(image, Some("cat.png".into()));
            assert!(!save);
        }
        other => panic!("expected say, got {other:?}"),
    }
}

#[test]
fn say_requires_a_prompt() {
    assert!(Args::try_parse_from(["parley", "say"]).is_err());
}

#[test]
fn export_takes_input_and_output() {
    let args = parse_args(&["parley", "export", "chat.json", "-o", "chat.md"]);
    match args.command {
        Some(Commands::Export {
            input,
            output,
            format,
        }) => {
            assert_eq!(input, Path::new("chat.json"));
            assert_eq!(output, Some("chat.md".into()));
            assert_eq!(format, export::ExportFormat::Markdown);
        }
        other => panic!("expected export, got {other:?}"),
    }
}

#[test]
fn export_format_accepts_html() {
    let args = parse_args(&["parley", "export", "chat.json", "--format", "html"]);
    assert!(matches!(
        args.command,
        Some(Commands::Export {
            format: export::ExportFormat::Html,
            ..
        })
    ));
}

#[test]
fn overrides_carry_cli_values() {
    let args = parse_args(&["parley", "--history-dir", "logs", "-m", "m1"]);
    let overrides = args.overrides();
    assert_eq!(overrides.model.as_deref(), Some("m1"));
    assert_eq!(overrides.history_dir, Some("logs".into()));
    assert!(!overrides.no_live_print);
}

#[test]
fn chat_input_commands() {
    assert_eq!(parse_input("   "), ChatInput::Empty);
    assert_eq!(parse_input("hello there "), ChatInput::Send("hello there".into()));
    assert_eq!(parse_input("/quit"), ChatInput::Quit);
    assert_eq!(parse_input("/save"), ChatInput::Save(None));
    assert_eq!(
        parse_input("/save notes/a.json"),
        ChatInput::Save(Some("notes/a.json".into()))
    );
    assert_eq!(
        parse_input("/export  out.md "),
        ChatInput::Export(Some("out.md".into()))
    );
    assert_eq!(parse_input("/html"), ChatInput::Html(None));
    assert_eq!(
        parse_input("/image my cat.png"),
        ChatInput::Image("my cat.png".into())
    );
    assert!(matches!(parse_input("/image"), ChatInput::Unknown(_)));
    assert!(matches!(parse_input("/frobnicate"), ChatInput::Unknown(_)));
}

#[tokio::test]
async fn backslash_continues_a_line() {
    let mut lines = "first \\\nsecond\\\nthird\nnext\n".as_bytes().lines();
    assert_eq!(
        read_entry(&mut lines).await.unwrap().as_deref(),
        Some("first \nsecond\nthird")
    );
    assert_eq!(read_entry(&mut lines).await.unwrap().as_deref(), Some("next"));
    assert_eq!(read_entry(&mut lines).await.unwrap(), None);
}

#[tokio::test]
async fn dangling_continuation_is_submitted_at_eof() {
    let mut lines = "unfinished\\".as_bytes().lines();
    assert_eq!(
        read_entry(&mut lines).await.unwrap().as_deref(),
        Some("unfinished\n")
    );
}

#[tokio::test]
async fn chat_turn_is_recorded_and_archived_on_quit() {
    let dir = TempDir::new().unwrap();
    let config = resolved(dir.path());
    let transport =
        ScriptedTransport::new(vec![reasoning("hmm"), answer("hi there"), StreamMessage::End]);

    let (conversation, output) = run_session(&transport, &config, "hello\n/quit\n").await;

    let roles: Vec<Role> = conversation.iter().map(|msg| msg.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Reasoning, Role::Assistant]);
    assert_eq!(conversation.messages()[2].text_content(), "hi there");
    assert!(output.contains("🤖 Assistant: hi there"), "{output}");

    let json = files_with_extension(dir.path(), "json");
    let markdown = files_with_extension(dir.path(), "md");
    assert_eq!(json.len(), 1);
    assert_eq!(markdown.len(), 1);
    assert_eq!(json[0].file_stem(), markdown[0].file_stem());
    assert!(json[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("hello_"));
    assert_eq!(try_load_json(&json[0]).unwrap(), conversation);
}

#[tokio::test]
async fn failed_exchange_leaves_conversation_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = resolved(dir.path());
    let transport = ScriptedTransport::sequence(vec![
        Err(StreamError::Open("connection refused".into())),
        Ok(vec![answer("ok"), StreamMessage::End]),
    ]);

    let (conversation, output) = run_session(&transport, &config, "first\nsecond\n").await;

    assert!(output.contains("connection refused"), "{output}");
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.messages()[0].text_content(), "second");

    let requests = transport.recorded();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].roles, vec![Role::User]);
}

#[tokio::test]
async fn system_prompt_is_sent_first() {
    let dir = TempDir::new().unwrap();
    let mut config = resolved(dir.path());
    config.system_prompt = Some("be brief".into());
    let transport = ScriptedTransport::new(vec![answer("k"), StreamMessage::End]);

    run_session(&transport, &config, "hi\n").await;

    assert_eq!(transport.recorded()[0].roles, vec![Role::System, Role::User]);
}

#[tokio::test]
async fn image_is_attached_to_next_message_only() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("dot.png");
    fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
    let config = resolved(&dir.path().join("history"));
    let transport = ScriptedTransport::new(vec![answer("a dot"), StreamMessage::End]);

    let input = format!("/image {}\nwhat is it\nand now\n", image.display());
    let (conversation, output) = run_session(&transport, &config, &input).await;

    assert!(output.contains("📎"), "{output}");
    assert!(conversation.messages()[0].has_image());
    assert!(!conversation.messages()[2].has_image());
}

#[tokio::test]
async fn missing_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = resolved(dir.path());
    let transport = ScriptedTransport::new(vec![StreamMessage::End]);

    let (conversation, output) =
        run_session(&transport, &config, "/image /no/such/file.png\n").await;

    assert!(output.contains("No such image"), "{output}");
    assert!(conversation.is_empty());
    assert!(transport.recorded().is_empty());
}

#[tokio::test]
async fn nothing_is_archived_without_a_user_turn() {
    let dir = TempDir::new().unwrap();
    let config = resolved(&dir.path().join("history"));
    let transport = ScriptedTransport::new(vec![StreamMessage::End]);

    run_session(&transport, &config, "/quit\n").await;

    assert!(!dir.path().join("history").exists());
}

#[tokio::test]
async fn save_and_export_commands_honor_explicit_paths() {
    let dir = TempDir::new().unwrap();
    let config = resolved(&dir.path().join("history"));
    let transport = ScriptedTransport::new(vec![answer("yo"), StreamMessage::End]);
    let json_path = dir.path().join("mine.json");
    let md_path = dir.path().join("mine.md");

    let input = format!(
        "hey\n/save {}\n/export {}\n",
        json_path.display(),
        md_path.display()
    );
    let (conversation, output) = run_session(&transport, &config, &input).await;

    assert!(output.contains("💾 Saved to"), "{output}");
    assert_eq!(try_load_json(&json_path).unwrap(), conversation);
    let markdown = fs::read_to_string(&md_path).unwrap();
    assert!(markdown.starts_with("# Conversation"));
    assert!(markdown.contains("yo"));
}

#[tokio::test]
async fn live_print_echoes_while_streaming() {
    let dir = TempDir::new().unwrap();
    let mut config = resolved(dir.path());
    config.live_print = true;
    let transport = ScriptedTransport::new(vec![answer("streamed"), StreamMessage::End]);

    let (_, output) = run_session(&transport, &config, "go\n").await;

    assert!(output.contains("🤖 Assistant: streamed\n"), "{output}");
    assert_eq!(output.matches("🤖 Assistant:").count(), 1);
}

#[tokio::test]
async fn say_records_exchange_when_saving() {
    let dir = TempDir::new().unwrap();
    let config = resolved(dir.path());
    let transport = ScriptedTransport::new(vec![answer("four"), StreamMessage::End]);

    say::run_say(
        &transport,
        &config,
        vec!["two".into(), "plus".into(), "two".into()],
        None,
        true,
    )
    .await
    .unwrap();

    let json = files_with_extension(dir.path(), "json");
    assert_eq!(json.len(), 1);
    let saved = try_load_json(&json[0]).unwrap();
    assert_eq!(saved.messages()[0].text_content(), "two plus two");
    assert_eq!(saved.messages()[1].text_content(), "four");
}

#[tokio::test]
async fn say_propagates_stream_errors() {
    let dir = TempDir::new().unwrap();
    let config = resolved(dir.path());
    let transport = ScriptedTransport::new(vec![answer("half")]);

    let err = say::run_say(&transport, &config, vec!["hi".into()], None, true)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("before completion"), "{err}");
    assert!(files_with_extension(dir.path(), "json").is_empty());
}

#[test]
fn export_converts_saved_history() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("chat.json");
    let mut conversation = Conversation::new();
    conversation.add_message("user", "question", None).unwrap();
    conversation.record_exchange("answer", "");
    write_json(&conversation, &input).unwrap();

    let output = dir.path().join("out").join("chat.md");
    export::run_export(
        &input,
        Some(&output),
        dir.path(),
        export::ExportFormat::Markdown,
    )
    .unwrap();

    let markdown = fs::read_to_string(output).unwrap();
    assert!(markdown.contains("question"));
    assert!(markdown.contains("answer"));
}

#[test]
fn export_rejects_missing_input() {
    let dir = TempDir::new().unwrap();
    let result = export::run_export(
        &dir.path().join("absent.json"),
        None,
        dir.path(),
        export::ExportFormat::Markdown,
    );
    assert!(result.is_err());
}

#[test]
fn export_writes_html_to_history_dir() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("chat.json");
    let mut conversation = Conversation::new();
    conversation.add_message("user", "hello page", None).unwrap();
    write_json(&conversation, &input).unwrap();

    let history_dir = dir.path().join("history");
    export::run_export(&input, None, &history_dir, export::ExportFormat::Html).unwrap();

    let pages = files_with_extension(&history_dir, "html");
    assert_eq!(pages.len(), 1);
    assert!(fs::read_to_string(&pages[0]).unwrap().contains("hello page"));
}
