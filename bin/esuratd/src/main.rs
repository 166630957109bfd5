//! `esuratd` — the e-Surat server binary.
//!
//! Usage:
//!   esuratd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/esurat/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod admin;
mod auth_middleware;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use esurat_core::Module;
use tracing::{info, warn};

use config::ServerConfig;
use routes::AppState;

/// e-Surat server.
#[derive(Parser, Debug)]
#[command(name = "esuratd", about = "e-Surat server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load and verify server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    server_config.verify()?;

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = esurat_core::ServiceConfig {
        data_dir: Some(data_dir.clone()),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    // Embedded stores shared by all modules.
    let kv: Arc<dyn esurat_kv::KVStore> = Arc::new(
        esurat_kv::RedbStore::open(&core_config.resolve_db_path())
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let sql: Arc<dyn esurat_sql::SQLStore> = Arc::new(
        esurat_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    // Directory module seeds the default account hierarchy on first run.
    let directory_config = directory::service::DirectoryConfig {
        jwt_secret: server_config.jwt.secret.clone(),
        token_ttl: server_config.jwt.expire_secs,
    };
    let directory_module = directory::DirectoryModule::new(Arc::clone(&sql), directory_config)?;
    let directory_service = Arc::clone(directory_module.service());
    info!("directory module initialized");

    match &server_config.superadmin {
        Some(sa) => directory_service.apply_password_hash("superadmin", &sa.password_hash)?,
        None => warn!("no [superadmin] section in config; the seeded default password is active"),
    }

    // Mirror worker, when a remote is configured.
    let (mirror, mirror_cancel) = match &server_config.mirror {
        Some(remote) => {
            let (handle, rx) = mail::mirror::channel();
            let rest = mail::mirror::RestMirror::new(remote.url.clone(), remote.api_key.clone());
            let cancel = mail::mirror::start(rest, rx);
            info!("mirror worker started for {}", remote.url);
            (handle, Some(cancel))
        }
        None => (mail::mirror::MirrorHandle::disabled(), None),
    };

    // Mail module seeds the classification catalog on first run.
    let mail_config = mail::service::MailConfig {
        office_code: server_config.office.code.clone(),
    };
    let mail_module = mail::MailModule::new(
        Arc::clone(&sql),
        Arc::clone(&kv),
        directory_service.clone(),
        mirror,
        mail_config,
    )?;
    let mail_service = Arc::clone(mail_module.service());
    info!("mail module initialized");

    let module_routes = vec![
        (directory_module.name(), directory_module.routes()),
        (mail_module.name(), mail_module.routes()),
    ];

    let state = AppState {
        directory: directory_service,
        mail: mail_service,
        config: Arc::new(server_config),
    };

    let app = routes::build_router(state, module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("esuratd listening on {}", cli.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(cancel) = mirror_cancel {
        cancel.cancel();
    }
    info!("esuratd stopped");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
