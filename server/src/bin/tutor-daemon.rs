use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tutor_core::config::get_default_config_file;
use tutor_core::{Tutor, TutorConfig, VisionClient};
use tutor_server::config::AppConfig;
use tutor_server::http_server::{self, AppState};
use tutor_server::session::{InMemorySessionStore, SessionStore, SessionStoreRef};

#[derive(Parser, Debug)]
#[command(name = "tutor-daemon", about = "HTTP daemon for the exam tutor", version)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(long, env = "TUTOR_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: SocketAddr,

    /// Idle minutes before a session is dropped (0 keeps sessions forever)
    #[arg(long, env = "TUTOR_SESSION_TTL_MINUTES", default_value_t = 60)]
    session_ttl_minutes: i64,

    /// Seconds between expired-session sweeps
    #[arg(long, default_value_t = 60)]
    cleanup_interval_secs: u64,

    /// Completion model to use
    #[arg(short, long)]
    model: Option<String>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file("exam-tutor")?,
    };
    let mut tutor = TutorConfig::load_layered(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(model) = &args.model {
        tutor.model_name = Some(model.clone());
    }

    Ok(AppConfig {
        http_addr: args.http_addr,
        session_ttl_minutes: args.session_ttl_minutes,
        cleanup_interval_secs: args.cleanup_interval_secs,
        tutor,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = load_config(&args)?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.tutor.log_level())),
        )
        .init();

    info!("Starting tutor daemon");

    if let Err(e) = config.tutor.require_api_key() {
        error!(error = %e, "Missing credentials");
        return Err(e.into());
    }

    let tutor = Tutor::from_config(&config.tutor).context("Failed to initialize tutor")?;
    let vision = VisionClient::new(&config.tutor).context("Failed to initialize vision client")?;
    if !vision.is_configured() {
        warn!("TUTOR_VISION_API_KEY not set, /transcribe is disabled");
    }

    let store: Arc<dyn SessionStore> = match config.session_ttl() {
        Some(ttl) => Arc::new(InMemorySessionStore::with_ttl(ttl)),
        None => Arc::new(InMemorySessionStore::new()),
    };
    spawn_cleanup(store.clone(), config.cleanup_interval_secs);

    let state = AppState::new(tutor, vision, store);
    http_server::run_server(state, config.http_addr).await?;

    info!("Tutor daemon shutting down");
    Ok(())
}

fn spawn_cleanup(store: SessionStoreRef, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = store.cleanup_expired_sessions().await {
                error!(error = %e, "Session cleanup failed");
            }
        }
    });
}
