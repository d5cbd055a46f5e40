use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use mssql_api::{CollectorAdapter, HttpApi};
use mssql_core::{Collector, Registry, docs};
use mssql_observe::logger_init;
use mssql_source::TdsSource;

mod config;
use config::{Cli, Command, ServeArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Built before anything else so a name clash stops startup.
    let registry = Registry::with_defaults().context("metric registry")?;

    match cli.into_command() {
        Command::Docs => {
            print!("{}", docs::render(&registry));
            Ok(())
        }
        Command::Serve(args) => serve(args, registry).await,
    }
}

async fn serve(args: ServeArgs, registry: Registry) -> anyhow::Result<()> {
    // 1) Logger
    logger_init(&args.logger_config()?)?;
    info!("logger initialized");

    // 2) Source + collector
    let source = TdsSource::new(args.source_config()?);
    info!(
        server = %source.config().host,
        port = source.config().port,
        user = %source.config().username,
        "database configured"
    );
    let collector = Arc::new(Collector::new(
        Arc::new(registry),
        Arc::new(source),
        args.collector_config(),
    ));
    info!(
        queries = collector.registry().queries().count(),
        policy = ?collector.config().policy,
        "collector ready"
    );

    // 3) HTTP
    let adapter = Arc::new(CollectorAdapter::new(collector));
    let app = HttpApi::new(adapter).router();

    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("scrape endpoint listening on http://{addr}/metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await?;

    info!("shutting down...");
    Ok(())
}

async fn shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
