//! `kbchat ask`: one agent turn on the terminal.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use kbchat_agent::{CancellationToken, build_agent};
use kbchat_core::event::EventBus;
use kbchat_gateway::framing::StepFramer;
use tracing::warn;

pub async fn run(
    config_path: Option<PathBuf>,
    question: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let event_bus = Arc::new(EventBus::default());
    kbchat_gateway::spawn_event_log(&event_bus);
    let agent = Arc::new(build_agent(&config, event_bus)?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the turn");
            on_interrupt.cancel();
        }
    });

    let (mut events, turn) = agent.spawn_turn(question, cancel);
    let mut framer = StepFramer::new();
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        if let Some(chunk) = framer.frame(&event) {
            write!(stdout, "{chunk}")?;
            stdout.flush()?;
        }
    }

    let result = turn.await?;
    writeln!(stdout)?;
    writeln!(stdout)?;
    writeln!(stdout, "{}", serde_json::to_string_pretty(&result)?)?;
    Ok(())
}
