//! Attendance notify - push alerts for attendance events.
//!
//! This is the main binary entry point. See the `attendance_notify`
//! library for the core functionality.

use anyhow::{Context, Result};
use attendance_notify::{http, notifications, Config, Pipeline, TriggerPayload};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Version of this binary.
const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI
#[derive(Parser)]
#[command(name = "attendance-notify")]
#[command(version = VERSION)]
#[command(about = "Push notifications for attendance events")]
struct Cli {
    /// Path to a JSON config file (overrides ATTENDANCE_NOTIFY_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the trigger endpoint
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate configuration and sign a test assertion locally
    CheckConfig,
    /// Run one invocation against a trigger payload file
    Trigger {
        /// Path to a JSON trigger payload
        file: PathBuf,
    },
}

/// Resolves when Ctrl-C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
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
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.bind_addr.clone());
    let pipeline = Arc::new(Pipeline::from_config(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let redriver = pipeline.redriver().map(|redriver| {
        log::info!("[Server] Outbox enabled, starting re-driver");
        tokio::spawn(redriver.run(shutdown_rx))
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    log::info!("Attendance notify v{} listening on {}", VERSION, bind);
    println!("Listening on {bind}");

    axum::serve(listener, http::build_router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    println!("Shutting down...");
    // Receiver may already be gone if the re-driver exited.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = redriver {
        if let Err(e) = handle.await {
            log::error!("[Server] Re-driver task failed: {e}");
        }
    }

    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    config.validate()?;
    let account = config.service_account()?;
    let assertion = notifications::sign_assertion(&account, chrono::Utc::now())
        .context("Service account key cannot sign")?;

    println!("Data store:      {}", config.supabase_url);
    println!("Project:         {}", account.project_id());
    println!("Issuer:          {}", account.client_email());
    println!("Key id:          {}", account.private_key_id().unwrap_or("<none>"));
    println!("Token endpoint:  {}", account.token_uri());
    println!("Deep link:       {}", config.deep_link());
    println!("Token cache:     {}", config.cache_access_tokens);
    println!("Outbox:          {}", config.enable_outbox);
    println!(
        "Assertion:       signed, expires {}",
        assertion.claims().exp
    );
    Ok(())
}

async fn trigger(config: &Config, file: &Path) -> Result<()> {
    let body = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let payload = TriggerPayload::parse(&body).context("Invalid trigger payload")?;
    let pipeline = Pipeline::from_config(config)?;

    let outcome = pipeline.handle(payload.record.as_ref()).await;
    println!("{} {}", outcome.status_code(), outcome.label());
    println!("{}", serde_json::to_string_pretty(&outcome.body())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await?,
        Commands::CheckConfig => check_config(&config)?,
        Commands::Trigger { file } => trigger(&config, &file).await?,
    }

    Ok(())
}
