use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use consilium::adapters::credentials::CredentialStore;
use consilium::adapters::metrics::MetricsCollector;
use consilium::agents::domain::{
    AggregatedResponse, ConversationContext, CoordinationMode, CoordinationPort,
    CoordinationRequest, Message,
};
use consilium::agents::CoordinatorHandler;
use consilium::cli::{AskArgs, Cli, Command, SelectArgs};
use consilium::config::{ConfigWatcher, Settings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;
    let metrics = Arc::new(MetricsCollector::new()?);
    let handler = Arc::new(
        CoordinatorHandler::new(settings, Arc::new(CredentialStore::new()), Some(metrics.clone()))
            .await?,
    );

    match cli.command {
        Command::Ask(args) => ask(&handler, &metrics, args).await,
        Command::Select(args) => select(&handler, args).await,
        Command::Agents => {
            for agent in handler.list_agents().await {
                let tags: Vec<&str> = agent.capability_tags.iter().map(String::as_str).collect();
                println!(
                    "{:<16} {:<28} tier={:<8} retrieval={:<5} tags=[{}]",
                    agent.id,
                    agent.display_role,
                    agent.model_tier,
                    agent.supports_retrieval,
                    tags.join(", ")
                );
            }
            Ok(())
        }
        Command::Chat { mode, scope } => chat(handler, cli.config, mode, scope).await,
    }
}

async fn ask(
    handler: &CoordinatorHandler,
    metrics: &MetricsCollector,
    args: AskArgs,
) -> anyhow::Result<()> {
    let request = consilium::request_from_args(&args, Vec::new(), handler.default_mode().await);

    match handler.coordinate(request).await {
        Ok(response) if args.json => println!("{}", serde_json::to_string_pretty(&response)?),
        Ok(response) => print_response(&response),
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            }
            anyhow::bail!(failure);
        }
    }

    if args.metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

async fn select(handler: &CoordinatorHandler, args: SelectArgs) -> anyhow::Result<()> {
    let mode = match args.mode {
        Some(mode) => mode,
        None => handler.default_mode().await,
    };
    let selection = handler
        .select(&args.query, args.primary.as_deref(), &args.supporting, mode)
        .await?;

    println!("mode:       {}", mode);
    println!("primary:    {}", selection.primary);
    println!("supporting: {}", selection.supporting.join(", "));
    Ok(())
}

fn print_response(response: &AggregatedResponse) {
    println!("{}", response.primary_content);
    if let Some(degradation) = &response.degradation {
        println!();
        println!("_{}_", degradation.footnote());
    }
    let participants: Vec<&str> = response.participating_agents.iter().map(String::as_str).collect();
    info!(
        run_id = %response.interactions.run_id,
        participants = %participants.join(","),
        "Answered"
    );
}

async fn chat(
    handler: Arc<CoordinatorHandler>,
    config_path: PathBuf,
    mode: Option<CoordinationMode>,
    scope: String,
) -> anyhow::Result<()> {
    // The watcher thread only signals; reloads run on the runtime
    let (reload_tx, mut reload_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let _watcher = ConfigWatcher::new(Settings::watch_paths(&config_path), move || {
        let _ = reload_tx.send(());
    })?;

    let reloader = handler.clone();
    let reload_path = config_path.clone();
    tokio::spawn(async move {
        while reload_rx.recv().await.is_some() {
            match Settings::load(&reload_path) {
                Ok(settings) => match reloader.reload(settings).await {
                    Ok(()) => info!("Configuration reloaded successfully"),
                    Err(e) => error!("Failed to rebuild engine: {}", e),
                },
                Err(e) => error!("Failed to reload configuration: {}", e),
            }
        }
    });

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("consilium chat; empty line or Ctrl-D to quit");

    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            break;
        }

        let mode = match mode {
            Some(mode) => mode,
            None => handler.default_mode().await,
        };
        let context = ConversationContext::new("", &scope).with_history(history.clone());
        match handler.coordinate(CoordinationRequest::new(query, mode, context)).await {
            Ok(response) => {
                print_response(&response);
                history.push(Message::user(query));
                history.push(Message::assistant(response.primary_content));
            }
            Err(failure) => error!(error = %failure, "Coordination failed"),
        }
    }
    Ok(())
}
