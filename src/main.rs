//! chat-roster: resolve the participants of chat-history exports.
//!
//! Usage:
//!   chat-roster result.json chats/messages.html export.zip
//!   chat-roster --pretty --split-channels export.zip > roster.json
//!
//! Environment variables:
//!   RUST_LOG - log filter (default: warn,chat_roster=info)
//!   CHAT_ROSTER_MAX_FILE_MB - largest export file read, in MB

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use chat_roster::config::{self, BatchConfig};
use chat_roster::pipeline::import::Aggregator;

#[derive(Parser, Debug)]
#[command(name = "chat-roster")]
#[command(about = "Build a deduplicated participant roster from chat exports")]
#[command(version)]
struct Args {
    /// Export files: .json, .html/.htm, or .zip archives of them
    paths: Vec<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Emit {"participants": [...], "channels": [...]} instead of one list
    #[arg(long)]
    split_channels: bool,

    /// Largest export file read, in MB
    #[arg(long, env = "CHAT_ROSTER_MAX_FILE_MB")]
    max_file_mb: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    chat_roster::init_tracing();
    let args = Args::parse();

    tracing::info!(
        version = config::APP_VERSION,
        inputs = args.paths.len(),
        "{} starting",
        config::APP_NAME
    );

    let mut batch_config = BatchConfig::default();
    if let Some(mb) = args.max_file_mb {
        batch_config.max_file_bytes = mb.saturating_mul(1024 * 1024);
    }

    let roster = Aggregator::new(batch_config)
        .run(&args.paths)
        .context("no export could be read")?;

    let output = if args.split_channels {
        let (participants, channels) = roster.partition_by_channel();
        serde_json::json!({ "participants": participants, "channels": channels })
    } else {
        serde_json::to_value(&roster)?
    };

    let mut stdout = std::io::stdout().lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut stdout, &output)?;
    } else {
        serde_json::to_writer(&mut stdout, &output)?;
    }
    writeln!(stdout)?;

    Ok(())
}
