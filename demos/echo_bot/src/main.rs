//! Echo Bot Example
//!
//! A console bot showing the pieces of a Yak dialog:
//!
//! - `main` is the root topic, entered on the first line typed
//! - `order` is nested from `main` and hands the chosen item back through
//!   the `ordered` continuation
//! - `global` hooks (`/help`, `/cancel`, echo) answer whatever the active
//!   topic does not; `order` opts out of echo with a deny-list
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --user alice
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use yak::prelude::*;
use yak::runtime::config::{ConfigLoader, YakConfig};
use yak::runtime::logging;

const MENU: [&str; 3] = ["tea", "coffee", "cocoa"];

#[derive(Debug, Parser)]
#[command(about = "Talk to a Yak bot on the console")]
struct Args {
    /// Session id used for this console.
    #[arg(long, default_value = "console")]
    user: String,

    /// Configuration file; defaults to yak.toml lookup.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ============================================================================
// Topics
// ============================================================================

fn main_topic() -> yak::core::YakResult<Topic> {
    let hello = try_def_pattern(MAIN_TOPIC, "hello", [r"^(hello|hi)\b"], |_, _| async {
        Ok("hi! type 'order' to get a drink, /help for commands")
    })?;

    let order = try_def_pattern(
        MAIN_TOPIC,
        "order",
        [r"^order\b"],
        |state: DialogState, _| async move {
            state
                .enter_topic("order", json!({ "menu": MENU }), Some("ordered"))
                .await?;
            Ok(format!("what would you like? ({})", MENU.join(", ")))
        },
    )?;

    Ok(def_topic(
        MAIN_TOPIC,
        |_, external| async move {
            let user = external["id"].to_string();
            info!(user = %user, "Conversation started");
            Ok(json!({ "orders": 0 }))
        },
        TopicOptions::new()
            .root(true)
            .hooks([hello, order])
            .continuation("ordered", |state: DialogState, item: Value| async move {
                let Some(item) = item.as_str() else {
                    return Ok("order cancelled".to_string());
                };
                let count = state.update_data(|data| {
                    let n = data["orders"].as_u64().unwrap_or(0) + 1;
                    data["orders"] = json!(n);
                    n
                })?;
                Ok(format!("one {item} coming up (order #{count})"))
            }),
    ))
}

fn order_topic() -> Topic {
    let pick = def_hook(
        "order",
        "pick",
        |state: DialogState, message: Message| async move {
            let text = message.text.unwrap_or_default().trim().to_lowercase();
            let on_menu = state
                .data()
                .and_then(|data| data["menu"].as_array().cloned())
                .is_some_and(|menu| menu.iter().any(|item| item.as_str() == Some(text.as_str())));
            Ok(on_menu.then_some(text))
        },
        |mut state: DialogState, item: String| async move { state.exit_topic(json!(item)).await },
    );

    let reprompt = def_hook(
        "order",
        "reprompt",
        |_, message: Message| async move {
            Ok(message.text.filter(|text| !text.starts_with('/')))
        },
        |_, text: String| async move {
            Ok(format!("sorry, no {text} today. pick one of {}", MENU.join(", ")))
        },
    );

    def_topic(
        "order",
        |args, _| async move { Ok(args) },
        TopicOptions::new()
            .hooks([pick, reprompt])
            .after_init(|state: DialogState| async move { state.disable_hooks(["echo"]) }),
    )
}

fn global_topic() -> yak::core::YakResult<Topic> {
    let help = try_def_pattern(GLOBAL_TOPIC, "help", [r"^/help$"], |_, _| async {
        Ok(vec![
            "hello     - greet the bot",
            "order     - order a drink",
            "/cancel   - leave the current topic",
            "/help     - this help",
        ])
    })?;

    let cancel = try_def_pattern(
        GLOBAL_TOPIC,
        "cancel",
        [r"^/cancel$"],
        |mut state: DialogState, _| async move {
            let nested = state
                .context()
                .is_some_and(|ctx| ctx.topic() != MAIN_TOPIC);
            if nested {
                state.exit_topic(Value::Null).await
            } else {
                Ok(vec![json!("nothing to cancel")])
            }
        },
    )?;

    let echo = def_hook(
        GLOBAL_TOPIC,
        "echo",
        |_, message: Message| async move { Ok(message.text) },
        |_, text: String| async move { Ok(text) },
    );

    Ok(def_topic(
        GLOBAL_TOPIC,
        |_, _| async { Ok(Value::Null) },
        TopicOptions::new().hooks([help, cancel, echo]),
    ))
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn load_config(path: Option<PathBuf>) -> YakConfig {
    let loader = match path {
        Some(path) => ConfigLoader::new().file(path),
        None => ConfigLoader::new(),
    };
    loader.load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config ({e}), using defaults");
        YakConfig::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config);
    logging::init_from_config(&config.logging);

    let runtime = init(
        [main_topic()?, order_topic(), global_topic()?],
        YakOptions::from_config(&config)?,
    )?;
    let external = json!({ "id": args.user, "type": "text" });

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        match runtime.handle(external.clone(), line.trim()).await {
            Ok(replies) => {
                for reply in replies {
                    let text = match reply {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    stdout.write_all(format!("{text}\n").as_bytes()).await?;
                }
            }
            Err(e) => error!(error = %e, "Failed to handle message"),
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
