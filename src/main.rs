//! # confab
//!
//! Session archive server binary. `serve` runs the HTTP API; the remaining
//! subcommands are operator actions against the same database.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use confab_core::grants::GrantScope;
use confab_core::{SessionId, UploadTier, UserId};
use confab_server::{AppState, ServerConfig};
use confab_settings::Settings;
use confab_store::{Database, FsObjectStore, SessionRepo, ShareRepo, UserRepo, UserStatus};
use confab_telemetry::{init_telemetry, TelemetryConfig};

/// Confab session archive.
#[derive(Parser, Debug)]
#[command(name = "confab", about = "Session archive server")]
struct Cli {
    /// Settings file (defaults to `$CONFAB_CONFIG` or `~/.confab/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server until interrupted.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides settings, 0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Open a session to every authenticated user.
    GrantSystem {
        session_id: String,
        /// Expire the grant after this many days.
        #[arg(long)]
        expires_in_days: Option<u32>,
    },
    /// Register a user.
    CreateUser {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Activate or deactivate a user.
    SetUserStatus {
        user_id: String,
        /// `active` or `inactive`.
        status: UserStatus,
    },
    /// Move a user between upload tiers.
    SetUploadTier {
        user_id: String,
        /// `standard` or `graced`.
        tier: UploadTier,
    },
}

fn load(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => confab_settings::load_settings_from_path(path),
        None => confab_settings::load_settings(),
    };
    settings.context("Failed to load settings")
}

fn open_database(settings: &Settings) -> Result<Database> {
    let path = PathBuf::from(&settings.storage.database_path);
    Database::open(&path).with_context(|| format!("Failed to open database: {}", path.display()))
}

async fn serve(settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::from_settings(&settings);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let db = open_database(&settings)?;
    let objects = Arc::new(FsObjectStore::new(&settings.storage.object_root));
    let state = AppState::new(config, db, objects);

    let handle = confab_server::start(state)
        .await
        .context("Failed to start server")?;
    info!(port = handle.port, "listening");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown requested");
    handle.shutdown().await;
    Ok(())
}

fn grant_system(settings: &Settings, session_id: String, expires_in_days: Option<u32>) -> Result<()> {
    let db = open_database(settings)?;
    let session_id = SessionId::from_raw(session_id);
    SessionRepo::new(db.clone())
        .get(&session_id)
        .with_context(|| format!("Unknown session: {session_id}"))?;

    let expires_at = match expires_in_days {
        None => None,
        Some(0) => return Err(anyhow!("--expires-in-days must be at least 1")),
        Some(days) => Some(Utc::now() + Duration::days(i64::from(days))),
    };
    let grant = ShareRepo::new(db).create(&session_id, &GrantScope::System, expires_at)?;
    println!("{}", grant.id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli.config.as_ref())?;

    let telemetry = TelemetryConfig::from_settings(&settings.logging.level, settings.logging.json)
        .context("Invalid logging configuration")?;
    init_telemetry(&telemetry).context("Failed to initialize logging")?;

    match cli.command {
        Command::Serve { host, port } => serve(settings, host, port).await,
        Command::GrantSystem {
            session_id,
            expires_in_days,
        } => grant_system(&settings, session_id, expires_in_days),
        Command::CreateUser { email, name } => {
            let users = UserRepo::new(open_database(&settings)?);
            let user = users.create(&email, name.as_deref())?;
            println!("{}", user.id);
            Ok(())
        }
        Command::SetUserStatus { user_id, status } => {
            let users = UserRepo::new(open_database(&settings)?);
            users.set_status(&UserId::from_raw(user_id), status)?;
            Ok(())
        }
        Command::SetUploadTier { user_id, tier } => {
            let users = UserRepo::new(open_database(&settings)?);
            users.set_upload_tier(&UserId::from_raw(user_id), tier)?;
            Ok(())
        }
    }
}
