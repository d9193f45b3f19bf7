//! NPC Voice Box - talk to a persona from the terminal
//!
//! Commands inside a session: `quit`/`exit` to leave, `reset` to wipe the
//! persona's memory.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use npc_voicebox::{Config, ConversationEngine, OpenAICompatProvider, RenderStrategy, Roster};

#[derive(Debug, Parser)]
#[command(name = "npc-voicebox", version, about = "Talk to NPC personas over an OpenAI-compatible server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml", env = "NPC_CONFIG")]
    config: PathBuf,

    /// Persona to talk to (skips the selection prompt)
    #[arg(short, long)]
    persona: Option<String>,

    /// Directory for persona memory files
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Directory of extra persona TOML files
    #[arg(long)]
    roster_dir: Option<PathBuf>,

    /// How history is sent to the server
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Chat,
    Completion,
}

impl From<StrategyArg> for RenderStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Chat => RenderStrategy::Chat,
            StrategyArg::Completion => RenderStrategy::Completion,
        }
    }
}

type InputLines = Lines<BufReader<Stdin>>;

/// Run `work` unless `interrupt` resolves first. `None` means interrupted.
///
/// `interrupt` is one listener reused for the whole session, so a Ctrl-C
/// that arrives between two calls is still seen by the next one.
async fn until_interrupted<T, I>(work: impl Future<Output = T>, interrupt: Pin<&mut I>) -> Option<T>
where
    I: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => None,
        out = work => Some(out),
    }
}

/// Print `prompt` and wait for a line. `None` on EOF or Ctrl-C.
async fn read_line<I: Future>(
    input: &mut InputLines,
    prompt: &str,
    interrupt: Pin<&mut I>,
) -> anyhow::Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let line = until_interrupted(input.next_line(), interrupt)
        .await
        .transpose()?;
    Ok(line.flatten())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "npc_voicebox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = cli.save_dir {
        config.engine.save_dir = dir;
    }
    if let Some(strategy) = cli.strategy {
        config.engine.strategy = strategy.into();
    }

    let mut roster = Roster::builtin();
    if let Some(ref dir) = cli.roster_dir {
        let loaded = roster.load_dir(dir).await?;
        tracing::info!("📦 Loaded {} persona file(s) from {}", loaded, dir.display());
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    println!("--- NPC Voice Box ---");
    println!("Server: {} ({})", config.server.base_url(), config.server.model);
    println!("Available NPCs: {}", roster.names().join(", "));

    let choice = match cli.persona {
        Some(choice) => choice,
        None => read_line(&mut input, "Select NPC to talk to: ", interrupt.as_mut())
            .await?
            .unwrap_or_default(),
    };

    let Some(persona) = roster.get(&choice).cloned() else {
        println!("NPC not found. Exiting.");
        return Ok(ExitCode::FAILURE);
    };

    let backend = Arc::new(OpenAICompatProvider::from_server(&config.server)?);
    let mut npc = ConversationEngine::new(persona, config.engine, backend).await?;
    let name = npc.persona().name.clone();

    println!("\nConnected to {}. (Type 'quit' to exit, 'reset' to wipe memory)", name);
    println!("{}", "-".repeat(40));

    while let Some(line) = read_line(&mut input, "You: ", interrupt.as_mut()).await? {
        let command = line.trim().to_lowercase();
        if command == "quit" || command == "exit" {
            break;
        }

        if command == "reset" {
            npc.reset().await?;
            println!("[Memory Wiped]");
            continue;
        }

        let Some(reply) = until_interrupted(npc.submit(&line), interrupt.as_mut()).await else {
            break;
        };
        println!("{}: {}", name, reply?);
    }

    println!("\nSession ended.");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{pending, ready};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_interrupt_cancels_pending_work() {
        let interrupt = ready(());
        tokio::pin!(interrupt);
        assert_eq!(until_interrupted(pending::<u32>(), interrupt.as_mut()).await, None);
    }

    #[tokio::test]
    async fn test_work_finishes_without_interrupt() {
        let interrupt = pending::<()>();
        tokio::pin!(interrupt);
        assert_eq!(until_interrupted(ready(7), interrupt.as_mut()).await, Some(7));
        assert_eq!(until_interrupted(async { 8 }, interrupt.as_mut()).await, Some(8));
    }

    #[tokio::test]
    async fn test_interrupt_during_request() {
        let (tx, rx) = oneshot::channel::<()>();
        tokio::pin!(rx);

        // Signal lands while the request is still in flight
        let request = async move {
            tx.send(()).unwrap();
            pending::<u32>().await
        };
        assert_eq!(until_interrupted(request, rx.as_mut()).await, None);
    }

    #[tokio::test]
    async fn test_interrupt_between_calls_is_kept() {
        let (tx, rx) = oneshot::channel::<()>();
        tokio::pin!(rx);

        assert_eq!(until_interrupted(ready(1), rx.as_mut()).await, Some(1));
        tx.send(()).unwrap();
        assert_eq!(until_interrupted(pending::<u32>(), rx.as_mut()).await, None);
    }
}
