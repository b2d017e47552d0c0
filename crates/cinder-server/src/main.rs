use std::io::Read;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use cinder_core::PasteId;
use cinder_logging::CinderSubscriberBuilder;
use cinder_server::config::{Cli, Command, ServeArgs, ServerConfig};
use cinder_server::{AppState, build_router, client, open_store, spawn_sweeper};
use clap::Parser;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Seal { origin, id } => seal(origin, id),
        Command::Open { url } => open(&url),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.apply_overrides(&args);

    let _log_guard = CinderSubscriberBuilder::new()
        .with_config(config.log.clone())
        .try_init()?;

    let store = open_store(&config).context("opening paste store")?;
    let state = AppState::new(&config, store);

    let sweep_every = Duration::from_secs(config.storage.sweep_interval_secs.max(1));
    let sweeper = spawn_sweeper(state.lifecycle.clone(), sweep_every);

    let router = build_router(&config, state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, "Cinder listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("Cinder stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    Ok(input)
}

fn seal(origin: Option<String>, id: Option<String>) -> anyhow::Result<()> {
    let id = id
        .map(|raw| PasteId::parse(&raw))
        .transpose()
        .context("invalid paste id")?;
    let plaintext = read_stdin()?;

    let target = origin.as_deref().zip(id.as_ref());
    let sealed = client::seal(&plaintext, target)?;

    println!("content: {}", sealed.content);
    match sealed.share_url {
        Some(url) => println!("url: {}", url),
        None => println!("key: {}", sealed.fragment),
    }
    Ok(())
}

fn open(url: &str) -> anyhow::Result<()> {
    let content = read_stdin()?;
    let plaintext = client::open(url, content.trim())?;
    print!("{}", plaintext);
    Ok(())
}
