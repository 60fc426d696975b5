//! # DonorLink — notification dispatch server
//!
//! Usage:
//!   donorlink serve                          # Start the gateway (default port 3000)
//!   donorlink dispatch --request-id r1 --event request.json
//!   donorlink notifications <uid>            # List in-app notifications
//!   donorlink register-token <uid> <token>   # Save a donor's push token
//!   donorlink verify-image photo.jpg --expect wheelchair
//!   donorlink init                           # Write the default config file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use donorlink_core::config::DonorLinkConfig;
use donorlink_core::traits::RecordStore;
use donorlink_core::types::{Document, Fields, NotificationRecord, RequestEvent, fields};
use donorlink_notify::{RequestCreatedHandler, TriggerContext};
use donorlink_vision::{HttpImageLabeler, LabelVerifier};

#[derive(Parser)]
#[command(
    name = "donorlink",
    version,
    about = "🩺 DonorLink — donation request notifications"
)]
struct Cli {
    /// Config file (default: ~/.donorlink/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Dispatch one request-created event from a JSON file
    Dispatch {
        #[arg(long)]
        request_id: String,
        /// JSON object holding the request document
        #[arg(long)]
        event: String,
    },
    /// List a user's in-app notifications, newest first
    Notifications {
        uid: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Save a push registration token for a user
    RegisterToken { uid: String, token: String },
    /// Check a donation photo against expected labels
    VerifyImage {
        file: String,
        /// Expected label (repeatable); defaults to the configured labels
        #[arg(long = "expect")]
        expect: Vec<String>,
    },
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(path: Option<&str>) -> Result<DonorLinkConfig> {
    let mut config = match path {
        Some(path) => DonorLinkConfig::load_from(&expand_path(path))?,
        None => DonorLinkConfig::load()?,
    };
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "donorlink=debug,donorlink_core=debug,donorlink_notify=debug,donorlink_vision=debug,donorlink_gateway=debug,tower_http=debug"
    } else {
        "donorlink=info,donorlink_core=info,donorlink_notify=info,donorlink_vision=info,donorlink_gateway=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    let config = match &cli.command {
        Command::Init { force } => return init_config(config_path, *force),
        _ => load_config(config_path)?,
    };

    match cli.command {
        Command::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            println!("🩺 DonorLink v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "   🌐 Gateway:  http://{}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   🗄️  Store:    {} ({})", config.store.backend, config.store.path);
            println!("   📲 Push:     {}", config.push.backend);
            println!();

            let state = Arc::new(donorlink_gateway::AppState::from_config(config)?);
            donorlink_gateway::start(state).await?;
        }
        Command::Dispatch { request_id, event } => {
            let raw = std::fs::read_to_string(expand_path(&event))
                .with_context(|| format!("reading {event}"))?;
            let doc: Document = serde_json::from_str(&raw)
                .with_context(|| format!("{event} must hold a JSON object"))?;
            let event = RequestEvent::from_document(&request_id, &doc)?;

            let controller = donorlink_notify::controller_from_config(&config)?;
            let ctx = TriggerContext::new("cli");
            let report = controller.on_request_created(&ctx, event).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Notifications { uid, limit } => {
            let store = donorlink_notify::store_from_config(&config.store)?;
            let docs = store
                .find_by(&config.collections.notifications, fields::TO_UID, &uid, limit)
                .await?;
            if docs.is_empty() {
                println!("📭 No notifications for {uid}");
            }
            for (id, doc) in &docs {
                let note = NotificationRecord::from_document(id, doc);
                println!(
                    "🔔 [{}] {}: {}",
                    note.timestamp
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".into()),
                    note.title,
                    note.message
                );
            }
        }
        Command::RegisterToken { uid, token } => {
            let token = token.trim();
            anyhow::ensure!(!token.is_empty(), "token must not be empty");
            let store = donorlink_notify::store_from_config(&config.store)?;
            let mut update = Fields::new();
            update.insert(fields::FCM_TOKEN.into(), token.into());
            store.set(&config.collections.users, &uid, update).await?;
            println!("🔑 Push token saved for {uid}");
        }
        Command::VerifyImage { file, expect } => {
            let image =
                std::fs::read(expand_path(&file)).with_context(|| format!("reading {file}"))?;
            let labeler = HttpImageLabeler::new(&config.vision)?;
            let verifier = if expect.is_empty() {
                LabelVerifier::new(&config.vision.expected_labels, config.vision.min_confidence)
            } else {
                LabelVerifier::new(&expect, config.vision.min_confidence)
            };
            let report = donorlink_vision::verify_image(&labeler, &verifier, &image).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.verified {
                std::process::exit(2);
            }
        }
        Command::Init { .. } => {}
    }

    Ok(())
}

fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let path = path
        .map(expand_path)
        .unwrap_or_else(DonorLinkConfig::default_path);
    if path.exists() && !force {
        println!("⚠️  Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }
    DonorLinkConfig::default().save_to(&path)?;
    println!("✅ Config written to {}", path.display());
    Ok(())
}
