//! Command-line driver for the research agent.

use agent_host::{chat, ResearchOrchestrator};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use providers::ProviderInvoker;
use services::HistoryManager;
use shared::agent_api::ChatMessage;
use shared::history::HistoryStore;
use shared::settings::{ProviderChoice, ProviderKeys, ResearchSettings, SessionOverrides};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Multi-step research agent: query generation, web research with citations,
/// reflection, and a cited final answer.
#[derive(Parser, Debug)]
#[command(name = "pro-search", version, about, long_about = None)]
struct Cli {
    /// Research question (omit when using a subcommand)
    question: Option<String>,

    /// LLM provider: auto, gemini or deepseek
    #[arg(short, long)]
    provider: Option<ProviderChoice>,

    /// Model for reflection and the final answer
    #[arg(short, long)]
    model: Option<String>,

    /// Number of initial search queries
    #[arg(long)]
    initial_queries: Option<usize>,

    /// Maximum number of research loops
    #[arg(long)]
    max_loops: Option<u32>,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Session id for history grouping (generated when omitted)
    #[arg(short, long)]
    session: Option<String>,

    /// Disable the hybrid search strategy (Gemini search tooling)
    #[arg(long)]
    no_hybrid: bool,

    /// Allow LLM-only research when no search backend is usable
    #[arg(long)]
    simulated: bool,

    /// History file location
    #[arg(long, default_value = "data/conversation_history.json")]
    history_file: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Single chat turn outside the research workflow
    Chat {
        /// Message to send
        message: String,
    },
    /// List stored conversation sessions
    Sessions,
    /// Delete all history records of a session
    ClearSession {
        /// Session id to clear
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let history = Arc::new(HistoryManager::new(&cli.history_file));

    match &cli.command {
        Some(Commands::Sessions) => {
            let sessions = history.sessions_summary();
            if sessions.is_empty() {
                println!("No stored sessions.");
                return Ok(());
            }
            for session in sessions {
                println!(
                    "{}  {}  {} message(s)  last: {}",
                    session.session_id,
                    session.last_timestamp.format("%Y-%m-%d %H:%M"),
                    session.total_messages,
                    session.last_query
                );
            }
            Ok(())
        }
        Some(Commands::ClearSession { session_id }) => {
            let deleted = history.delete_session(session_id)?;
            println!("Deleted {deleted} record(s).");
            Ok(())
        }
        Some(Commands::Chat { message }) => {
            let (invoker, settings) = build_runtime(&cli, history.clone())?;
            run_chat(&cli, invoker, settings, history, message).await
        }
        None => {
            let Some(question) = cli.question.clone() else {
                bail!("provide a research question or a subcommand (see --help)");
            };
            let (invoker, settings) = build_runtime(&cli, history.clone())?;
            run_research(&cli, invoker, settings, history, &question).await
        }
    }
}

fn build_runtime(
    cli: &Cli,
    history: Arc<HistoryManager>,
) -> Result<(Arc<ProviderInvoker>, ResearchSettings)> {
    let keys = ProviderKeys::from_env();
    if !keys.any_configured() {
        bail!("no provider configured - set GEMINI_API_KEY and/or DEEPSEEK_API_KEY");
    }

    let overrides = SessionOverrides {
        provider: cli.provider,
        temperature: cli.temperature,
        reasoning_model: cli.model.clone(),
        number_of_initial_queries: cli.initial_queries,
        max_research_loops: cli.max_loops,
        session_id: Some(
            cli.session
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        ),
    };
    let mut settings = ResearchSettings::from_env().with_overrides(&overrides);
    if cli.no_hybrid {
        settings.use_hybrid_architecture = false;
    }
    if cli.simulated {
        settings.allow_simulated_research = true;
    }
    settings.validate()?;

    let invoker = ProviderInvoker::new(
        &keys,
        Duration::from_secs(settings.request_timeout_secs),
        Some(history as Arc<dyn HistoryStore>),
    )?;
    Ok((Arc::new(invoker), settings))
}

async fn run_research(
    cli: &Cli,
    invoker: Arc<ProviderInvoker>,
    settings: ResearchSettings,
    history: Arc<HistoryManager>,
    question: &str,
) -> Result<()> {
    let session_id = settings.session_id.clone().unwrap_or_default();
    println!(
        "Researching with provider={}, initial_queries={}, max_loops={}, session={}",
        settings.provider, settings.number_of_initial_queries, settings.max_research_loops,
        session_id
    );

    let orchestrator = ResearchOrchestrator::new(invoker, settings)?;
    let report = orchestrator
        .run(vec![ChatMessage::user(question)], cli.model.clone(), None)
        .await?;

    println!("\n{}\n", report.content);
    if !report.unique_sources.is_empty() {
        println!("Sources:");
        for source in &report.unique_sources {
            println!("  [{}] {}", source.label, source.value);
        }
    }
    println!(
        "\n({} research loop(s), {} quer{} ran)",
        report.research_loop_count,
        report.queries_ran.len(),
        if report.queries_ran.len() == 1 { "y" } else { "ies" }
    );

    history.add_record(
        &session_id,
        "ai_search",
        question,
        &report.content,
        &report.provider_used,
        cli.model.clone(),
    )?;
    Ok(())
}

async fn run_chat(
    cli: &Cli,
    invoker: Arc<ProviderInvoker>,
    settings: ResearchSettings,
    history: Arc<HistoryManager>,
    message: &str,
) -> Result<()> {
    let session_id = settings.session_id.clone().unwrap_or_default();
    let reply = chat(
        invoker.as_ref(),
        &[ChatMessage::user(message)],
        &settings,
        None,
    )
    .await;

    println!("{}", reply.content);
    if !reply.error {
        history.add_record(
            &session_id,
            "ai_chat",
            message,
            &reply.content,
            &reply.provider_used,
            cli.model.clone(),
        )?;
    }
    Ok(())
}
