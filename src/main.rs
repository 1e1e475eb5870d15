mod cli;

use cliprelay::config::{self, Config};
use cliprelay::{consumer, producer};
use cliprelay_core::events::RelayEventBus;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

async fn run_producer(config: Config) -> Result<()> {
    let producer_config = config.producer;
    tracing::info!(
        source = ?producer_config.source,
        profile = %producer_config.profile,
        segment_ms = producer_config.segment_duration_ms,
        "Starting producer"
    );

    let events = Arc::new(RelayEventBus::default());
    let source = producer::build_capture_source(&producer_config)?;
    let running = producer::spawn(&producer_config, source, events).await?;
    tracing::info!("Producer listening on {}", running.local_addr);

    tokio::select! {
        result = running.wait() => result?,
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutting down...");
    Ok(())
}

async fn run_consumer(config: Config) -> Result<()> {
    let consumer_config = config.consumer;
    tracing::info!(
        server = %consumer_config.server,
        sink = ?consumer_config.sink,
        "Starting consumer"
    );

    let events = Arc::new(RelayEventBus::default());
    let sink = consumer::build_sink(&consumer_config)?;
    let running = consumer::spawn(&consumer_config, sink, events);

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    running.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "cliprelay=debug,cliprelay_wire=debug,cliprelay_core=debug".to_string()
        } else {
            "cliprelay=info,cliprelay_wire=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Produce {
            host,
            port,
            segment_ms,
            source,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(host) = host {
                config.producer.host = host;
            }
            if let Some(port) = port {
                config.producer.port = port;
            }
            if let Some(ms) = segment_ms {
                config.producer.segment_duration_ms = ms;
            }
            if let Some(source) = source {
                config.producer.source = source.into();
            }
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_producer(config))
        }
        Commands::Consume { server, sink } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(server) = server {
                config.consumer.server = server;
            }
            if let Some(sink) = sink {
                config.consumer.sink = sink.into();
            }
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_consumer(config))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("cliprelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!(
        "  Producer: {} ({}, {} ms segments, {} source)",
        config.producer.bind_addr(),
        config.producer.profile,
        config.producer.segment_duration_ms,
        match config.producer.source {
            config::CaptureSourceKind::Synthetic => "synthetic",
            config::CaptureSourceKind::Command => "command",
        }
    );
    println!(
        "  Consumer: {} (cap {} bytes, skip above {}, {} sink)",
        config.consumer.server,
        config.consumer.max_response_bytes,
        config.consumer.skip_threshold,
        match config.consumer.sink {
            config::SinkKind::Clock => "clock",
            config::SinkKind::Command => "command",
        }
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }

    println!("\nEffective configuration:\n{}", config.to_toml()?);
    Ok(())
}
