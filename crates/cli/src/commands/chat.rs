//! `parley chat`: single-message or interactive chat.

use parley_agent::{MessageSender, ModeDispatcher, SendOptions};
use parley_config::AppConfig;
use parley_core::cancel::CancelFlag;
use parley_core::event::{EventBus, StatePatch, StateSink};
use parley_core::message::{Conversation, Message, Role};
use parley_core::mode::ChatModeId;
use parley_core::model::ModelSpec;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub struct ChatArgs {
    pub mode: Option<ChatModeId>,
    pub model: Option<String>,
    pub message: Option<String>,
    pub tools: Vec<String>,
}

/// Prints the growing assistant reply as patches arrive.
struct TerminalSink<W: Write + Send> {
    out: Mutex<W>,
    printed: Mutex<usize>,
}

impl<W: Write + Send> TerminalSink<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            printed: Mutex::new(0),
        }
    }

    /// Forget what was printed; the next reply starts from scratch.
    fn reset(&self) {
        if let Ok(mut printed) = self.printed.lock() {
            *printed = 0;
        }
    }
}

impl<W: Write + Send> StateSink for TerminalSink<W> {
    fn dispatch(&self, patch: StatePatch) {
        let StatePatch::SelectedConversation(conversation) = patch else {
            return;
        };
        let Some(last) = conversation.last_message().filter(|m| m.role == Role::Assistant) else {
            return;
        };
        let (Ok(mut printed), Ok(mut out)) = (self.printed.lock(), self.out.lock()) else {
            return;
        };
        if let Some(fresh) = last.content.get(*printed..) {
            if !fresh.is_empty() {
                let _ = write!(out, "{fresh}");
                let _ = out.flush();
                *printed = last.content.len();
            }
        }
    }
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let mode = args.mode.unwrap_or_default();

    // Check for API key early; give a clear error
    if !config.has_api_key() && matches!(mode, ChatModeId::Direct) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PARLEY_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let events = Arc::new(EventBus::default());
    let services = parley_providers::build_from_config(&config);
    let dispatcher = Arc::new(ModeDispatcher::from_services(
        &services,
        &config,
        Some(events.clone()),
    ));
    let sender = MessageSender::new(dispatcher)
        .with_api_key(config.api_key.clone())
        .with_events(events);

    let model = args
        .model
        .as_deref()
        .map(ModelSpec::resolve)
        .unwrap_or_else(|| config.default_model_spec());
    let tools = if args.tools.is_empty() {
        config.agent.default_tools.clone()
    } else {
        args.tools
    };
    let mut conversation = Conversation::new(
        model,
        config.default_system_prompt.clone(),
        config.default_temperature,
    );

    let cancel = CancelFlag::new();
    spawn_ctrl_c_handler(cancel.clone());
    let sink = TerminalSink::new(std::io::stdout());

    let options = SendOptions {
        delete_count: 0,
        mode: Some(mode),
        tools,
    };
    debug!(
        mode = %mode,
        model = %conversation.model.id,
        tools = options.tools.len(),
        "Starting chat session"
    );

    if let Some(text) = args.message {
        exchange(&sender, &mut conversation, text, &options, &cancel, &sink).await;
        return Ok(());
    }

    println!();
    println!("  Parley ({})", mode.name());
    println!("  Model:  {}", conversation.model.id);
    if matches!(mode, ChatModeId::Agent | ChatModeId::ConversationalAgent) {
        println!("  Tools:  {}", options.tools.join(", "));
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C stops a reply; type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        exchange(&sender, &mut conversation, line.to_string(), &options, &cancel, &sink).await;
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Send one message and keep whatever conversation comes back.
async fn exchange<W: Write + Send>(
    sender: &MessageSender,
    conversation: &mut Conversation,
    text: String,
    options: &SendOptions,
    cancel: &CancelFlag,
    sink: &TerminalSink<W>,
) {
    sink.reset();
    // a stop requested while idle must not cancel the next reply
    cancel.reset();

    let outcome = sender
        .send(conversation, Message::user(text), options.clone(), cancel, sink)
        .await;
    println!();

    if let Some(message) = outcome.user_message() {
        if outcome.is_aborted() {
            eprintln!("  [Stopped] {message}");
        } else {
            eprintln!("  [Error] {message}");
        }
    }
    *conversation = outcome.conversation;
}

fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            cancel.request();
        }
    });
}
