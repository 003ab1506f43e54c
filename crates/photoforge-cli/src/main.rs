use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use photoforge_contracts::choices::MenuOption;
use photoforge_contracts::{
    ConversationController, EventLog, EventPayload, FlowEvent, FlowStep, SessionId, SessionStore,
};
use photoforge_engine::{FsAssetStore, NullAssetStore, RequestOrchestrator, Transport};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use uuid::Uuid;

/// Session id used for the single local conversation the REPL drives.
const LOCAL_SESSION: SessionId = SessionId(1);

#[derive(Debug, Parser)]
#[command(name = "photoforge", version, about = "Interactive photo-edit engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// One-shot edit: all choices up front, result written to --out.
    Edit(EditArgs),
    /// Interactive conversation, one menu choice per line.
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
struct EditArgs {
    /// Path, http(s) URL, or data: URI of the source photo.
    #[arg(long)]
    input: String,
    /// logo | rounded | screenshot
    #[arg(long)]
    mode: String,
    /// JPEG | PNG | WEBP
    #[arg(long)]
    format: String,
    /// Replace the status bar (screenshot mode only).
    #[arg(long)]
    clean: bool,
    /// ios_light | ios_dark | android (required with --clean)
    #[arg(long)]
    style: Option<String>,
    /// Device frame key, e.g. iphone_15_pro.
    #[arg(long)]
    mockup: Option<String>,
    #[arg(long, default_value_t = 85)]
    quality: u8,
    /// Static assets directory (overlays/, frames/, fonts/).
    #[arg(long)]
    assets: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    assets: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("photoforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Chat(args) => run_chat(args),
    }
}

struct LocalRuntime {
    store: SessionStore,
    controller: ConversationController,
    transport: LocalTransport,
    assets: Option<FsAssetStore>,
    events: EventLog,
}

impl LocalRuntime {
    fn new(assets: Option<PathBuf>, out: PathBuf, events: Option<PathBuf>) -> Self {
        let events_path = events.unwrap_or_else(|| out.join("events.jsonl"));
        let store = SessionStore::new();
        Self {
            controller: ConversationController::new(store.clone()),
            store,
            transport: LocalTransport::new(out),
            assets: assets.map(FsAssetStore::new),
            events: EventLog::new(events_path, Uuid::new_v4().to_string()),
        }
    }

    fn finalize(&self, id: SessionId, config: &photoforge_contracts::ImageConfiguration, image_ref: &str) {
        match &self.assets {
            Some(assets) => {
                RequestOrchestrator::new(&self.store, assets, &self.transport, &self.events)
                    .finalize(id, config, image_ref);
            }
            None => {
                RequestOrchestrator::new(&self.store, &NullAssetStore, &self.transport, &self.events)
                    .finalize(id, config, image_ref);
            }
        }
    }

    fn log(&self, id: SessionId, event_type: &str, payload: Value) {
        let _ = self.events.emit_for(id, event_type, json_object(payload));
    }
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let runtime = LocalRuntime::new(args.assets.clone(), args.out.clone(), args.events.clone());
    let id = LOCAL_SESSION;

    // Feed the flags through the conversation controller in menu order so
    // they get the same validation a button press would.
    let mut keys = vec![format!("mode_{}", args.mode)];
    if let Some(device) = args.mockup.as_deref() {
        keys.push(format!("mockup_{device}"));
    }
    keys.push(format!("format_{}", args.format));
    if args.mode == "screenshot" {
        if args.clean {
            let Some(style) = args.style.as_deref() else {
                bail!("--clean requires --style (ios_light | ios_dark | android)");
            };
            keys.push("clean_yes".to_string());
            keys.push(format!("style_{style}"));
        } else {
            keys.push("clean_no".to_string());
        }
    }

    runtime
        .controller
        .handle(FlowEvent::ImageSubmitted {
            id,
            image_ref: args.input.clone(),
        })
        .context("could not start the edit session")?;
    runtime
        .store
        .with_session(id, |session| session.quality = args.quality)
        .context("session vanished before configuration")?;
    runtime.log(id, "session_created", json!({ "image_ref": args.input }));

    let mut ready = None;
    for key in keys {
        let step = runtime
            .controller
            .handle(FlowEvent::ChoiceSelected {
                id,
                key: key.clone(),
            })
            .with_context(|| format!("choice {key:?} was rejected"))?;
        runtime.log(id, "choice_selected", json!({ "key": key }));
        if let FlowStep::Ready { config, image_ref } = step {
            ready = Some((config, image_ref));
        }
    }
    let Some((config, image_ref)) = ready else {
        bail!("the given choices do not complete a configuration");
    };

    runtime.finalize(id, &config, &image_ref);
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<i32> {
    let runtime = LocalRuntime::new(args.assets, args.out, args.events);
    let id = LOCAL_SESSION;

    let stdin = io::stdin();
    let mut line = String::new();
    let mut last_options: &'static [MenuOption] = &[];

    println!("Photoforge chat started. Send a photo with /photo <path>, /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let event = match parse_chat_line(input, id, last_options) {
            Ok(ChatCommand::Quit) => break,
            Ok(ChatCommand::Help) => {
                println!("Commands: /photo <ref>  /mockup <device>  /cancel  /help  /quit");
                println!("Answer menus with their number or the raw choice key.");
                continue;
            }
            Ok(ChatCommand::Event(event)) => event,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match runtime.controller.handle(event.clone()) {
            Ok(FlowStep::Prompt { text, options }) => {
                if let FlowEvent::ImageSubmitted { image_ref, .. } = &event {
                    runtime.log(id, "session_created", json!({ "image_ref": image_ref }));
                }
                if let FlowEvent::ChoiceSelected { key, .. } = &event {
                    runtime.log(id, "choice_selected", json!({ "key": key }));
                }
                last_options = options;
                println!("{text}");
                for (index, option) in options.iter().enumerate() {
                    println!("  {}. {}", index + 1, option.label);
                }
            }
            Ok(FlowStep::Ready { config, image_ref }) => {
                if let FlowEvent::ChoiceSelected { key, .. } = &event {
                    runtime.log(id, "choice_selected", json!({ "key": key }));
                }
                last_options = &[];
                runtime.finalize(id, &config, &image_ref);
            }
            Ok(FlowStep::Cancelled) => {
                runtime.log(id, "session_cancelled", json!({}));
                last_options = &[];
                println!("All clear. Send a new photo when ready.");
            }
            Err(err) => {
                runtime.log(id, "stale_input", json!({ "error": err.to_string() }));
                println!("{err}");
            }
        }
    }

    Ok(0)
}

enum ChatCommand {
    Event(FlowEvent),
    Help,
    Quit,
}

fn parse_chat_line(
    input: &str,
    id: SessionId,
    last_options: &'static [MenuOption],
) -> Result<ChatCommand, String> {
    if let Some(rest) = input.strip_prefix("/photo") {
        let parts = shell_words::split(rest.trim())
            .map_err(|err| format!("could not parse the photo reference: {err}"))?;
        return match parts.len() {
            1 => Ok(ChatCommand::Event(FlowEvent::ImageSubmitted {
                id,
                image_ref: parts[0].clone(),
            })),
            _ => Err("/photo takes exactly one path, URL, or data: URI".to_string()),
        };
    }
    if let Some(rest) = input.strip_prefix("/mockup") {
        let device = rest.trim();
        if device.is_empty() {
            return Err("/mockup requires a device key, e.g. iphone_15_pro".to_string());
        }
        return Ok(ChatCommand::Event(FlowEvent::ChoiceSelected {
            id,
            key: format!("mockup_{device}"),
        }));
    }
    match input {
        "/cancel" => return Ok(ChatCommand::Event(FlowEvent::CancelRequested { id })),
        "/help" => return Ok(ChatCommand::Help),
        "/quit" | "/exit" => return Ok(ChatCommand::Quit),
        _ => {}
    }
    if input.starts_with('/') {
        return Err(format!("unknown command {input:?}; try /help"));
    }

    // A bare number answers the menu on screen; anything else is taken as a
    // raw choice key and validated by the controller.
    if let Ok(index) = input.parse::<usize>() {
        let Some(option) = index.checked_sub(1).and_then(|i| last_options.get(i)) else {
            return Err(format!("no menu option {index} on screen"));
        };
        return Ok(ChatCommand::Event(FlowEvent::ChoiceSelected {
            id,
            key: option.key.to_string(),
        }));
    }
    Ok(ChatCommand::Event(FlowEvent::ChoiceSelected {
        id,
        key: input.to_string(),
    }))
}

/// Local stand-in for the chat transport: reads photo refs from disk, the
/// network, or inline data URIs, and "delivers" documents into the out dir.
struct LocalTransport {
    out_dir: PathBuf,
    http: HttpClient,
}

impl LocalTransport {
    fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            http: HttpClient::new(),
        }
    }
}

impl Transport for LocalTransport {
    fn resolve_image_bytes(&self, image_ref: &str) -> Result<Vec<u8>> {
        if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
            let response = self
                .http
                .get(image_ref)
                .send()
                .with_context(|| format!("failed fetching {image_ref}"))?;
            if !response.status().is_success() {
                bail!("fetch of {image_ref} returned {}", response.status());
            }
            return Ok(response
                .bytes()
                .context("failed reading fetched image bytes")?
                .to_vec());
        }
        if let Some(encoded) = data_uri_payload(image_ref) {
            return BASE64
                .decode(encoded.as_bytes())
                .context("invalid base64 in data: URI");
        }
        fs::read(image_ref).with_context(|| format!("could not read {image_ref}"))
    }

    fn deliver_document(&self, _id: SessionId, bytes: &[u8], filename: &str) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("could not create {}", self.out_dir.display()))?;
        let path = self.out_dir.join(filename);
        fs::write(&path, bytes).with_context(|| format!("could not write {}", path.display()))?;
        println!("Saved {}", path.display());
        Ok(())
    }

    fn deliver_text(&self, _id: SessionId, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}

fn data_uri_payload(image_ref: &str) -> Option<&str> {
    image_ref
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
}

fn json_object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = EventPayload::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_payload_extracts_base64_section() {
        assert_eq!(
            data_uri_payload("data:image/png;base64,AAAA"),
            Some("AAAA")
        );
        assert_eq!(data_uri_payload("file.png"), None);
        assert_eq!(data_uri_payload("data:image/png,raw"), None);
    }

    #[test]
    fn chat_lines_map_to_flow_events() {
        let id = SessionId(1);
        let parsed = parse_chat_line("/photo \"/tmp/a b.png\"", id, &[]).unwrap();
        assert!(matches!(
            parsed,
            ChatCommand::Event(FlowEvent::ImageSubmitted { ref image_ref, .. })
                if image_ref == "/tmp/a b.png"
        ));

        let parsed = parse_chat_line("/cancel", id, &[]).unwrap();
        assert!(matches!(
            parsed,
            ChatCommand::Event(FlowEvent::CancelRequested { .. })
        ));

        let parsed = parse_chat_line("/mockup pixel_8", id, &[]).unwrap();
        assert!(matches!(
            parsed,
            ChatCommand::Event(FlowEvent::ChoiceSelected { ref key, .. })
                if key == "mockup_pixel_8"
        ));
    }

    #[test]
    fn menu_numbers_resolve_against_the_options_on_screen() {
        use photoforge_contracts::choices::MODE_MENU;

        let id = SessionId(1);
        let parsed = parse_chat_line("2", id, MODE_MENU).unwrap();
        assert!(matches!(
            parsed,
            ChatCommand::Event(FlowEvent::ChoiceSelected { ref key, .. })
                if key == "mode_rounded"
        ));

        assert!(parse_chat_line("9", id, MODE_MENU).is_err());
        assert!(parse_chat_line("0", id, MODE_MENU).is_err());
    }

    #[test]
    fn raw_choice_keys_pass_through_unvalidated() {
        let id = SessionId(1);
        let parsed = parse_chat_line("format_PNG", id, &[]).unwrap();
        assert!(matches!(
            parsed,
            ChatCommand::Event(FlowEvent::ChoiceSelected { ref key, .. })
                if key == "format_PNG"
        ));
    }
}
