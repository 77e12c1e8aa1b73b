//! `parley ask`: Single-message or interactive chat through the pipeline.

use super::{CliResult, load_config};
use parley_config::AppConfig;
use parley_core::conversation::{InboundMessage, ReplyKind, SessionId};
use parley_gateway::Runtime;
use parley_pipeline::ChatReply;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>, message: Option<String>, session: Option<String>) -> CliResult {
    let config = load_config(config_path)?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PARLEY_API_KEY   = 'sk-...'   (generic)");
        eprintln!("    DEEPSEEK_API_KEY = 'sk-...'   (DeepSeek)");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'   (OpenAI)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = Runtime::from_config(config).await?;
    let session = session.map(|s| SessionId::from(s.as_str())).unwrap_or_default();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = runtime.chat.send(&session, &InboundMessage::text(msg)).await;
        eprint!("\r              \r");
        match reply {
            Ok(reply) => print_reply(&reply, ""),
            Err(e) => return Err(format!("Invalid message: {e}").into()),
        }
        return Ok(());
    }

    println!();
    println!("  Parley — Interactive Mode");
    println!();
    println!("  Provider:  {}", runtime.config.default_provider);
    println!("  Model:     {}", runtime.config.default_model);
    println!("  Rules:     {} active", runtime.admin.cache().len());
    println!("  Session:   {session}");
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if line.is_empty() {
            prompt()?;
            continue;
        }

        eprint!("  ...");
        let reply = runtime.chat.send(&session, &InboundMessage::text(line)).await;
        eprint!("\r     \r");
        match reply {
            Ok(reply) => {
                println!();
                print_reply(&reply, "  Parley > ");
                println!();
            }
            Err(e) => eprintln!("  [Invalid message] {e}"),
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_reply(reply: &ChatReply, prefix: &str) {
    for line in reply.payload.content.lines() {
        println!("{prefix}{line}");
    }
    if reply.payload.kind == ReplyKind::Image
        && let Some(url) = &reply.payload.media_ref
    {
        println!("{prefix}[image] {url}");
    }
    if let Some(citations) = &reply.payload.citations {
        println!("{prefix}[sources] {citations}");
    }
}
