pub mod models {
    pub mod emission;
    pub mod gemini;
}

pub mod api;
pub mod client;
pub mod config;
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod pg;
}
pub mod env_file;
pub mod factors;
pub mod schema;
pub mod store;
pub mod utils;
pub mod services {
    pub mod analytics;
    pub mod chatbot;
    pub mod contact;
    pub mod recommendations;
    pub mod seed;
}

use crate::api::AppState;
use crate::client::{GeminiClient, TextGenerator};
use crate::config::{Config, StoreBackend};
use crate::db::memory::MemoryStore;
use crate::db::pg::PgStore;
use crate::services::chatbot::ChatBridge;
use crate::services::contact::ContactInbox;
use crate::services::seed;
use crate::store::Store;
use chrono::Utc;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
    applied: usize,
}

#[derive(Debug, Default)]
struct CliArgs {
    env_file: Option<PathBuf>,
    seed: bool,
}

fn open_store(cfg: &Config) -> Result<Arc<dyn Store>, String> {
    match cfg.store_backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(&cfg.database_url, cfg.db_pool_size)?;
            info!("Connected to database (pool_size={})", cfg.db_pool_size);
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; all data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn chat_bridge(cfg: &Config) -> ChatBridge {
    match cfg.gemini_api_key.as_ref() {
        Some(key) => {
            let client = GeminiClient::new(key.clone(), cfg.gemini_model.clone(), cfg.ai_timeout);
            info!("Chatbot enabled (model={})", client.model());
            let generator: Arc<dyn TextGenerator> = Arc::new(client);
            ChatBridge::new(Some(generator))
        }
        None => {
            info!("Chatbot disabled: GEMINI_API_KEY is not set");
            ChatBridge::new(None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn serve(cfg: &Config, state: AppState) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .map_err(|e| format!("bind {} failed: {}", cfg.bind_addr, e))?;
    info!("Listening on http://{}", cfg.bind_addr);
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {}", e))
}

fn run(cli: &CliArgs) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (store={:?}, bind={}, ai_model={}, ai_timeout={}s, ai_key={}, contacts={})",
        cfg.store_backend,
        cfg.bind_addr,
        cfg.gemini_model,
        cfg.ai_timeout.as_secs(),
        if cfg.gemini_api_key.is_some() { "set" } else { "-" },
        cfg.contacts_file.display()
    );

    // 2) Open store (applies migrations for PostgreSQL)
    let store = open_store(&cfg)?;

    // 3) Optional seed
    if cli.seed {
        let report = seed::run(store.as_ref(), Utc::now())?;
        info!(
            "Database seeded: {} department(s), {} emission record(s)",
            report.departments, report.emissions
        );
        if cfg.store_backend == StoreBackend::Postgres {
            return Ok(());
        }
        info!("Seeded the in-memory store; continuing to serve it");
    }

    // 4) Serve the HTTP API
    let state = AppState {
        store,
        chat: Arc::new(chat_bridge(&cfg)),
        contacts: Arc::new(ContactInbox::new(cfg.contacts_file.clone())),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {}", e))?;
    runtime.block_on(serve(&cfg, state))?;
    info!("Server stopped");
    Ok(())
}

fn parse_cli() -> Result<CliArgs, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                if cli.env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                cli.env_file = Some(PathBuf::from(value));
            }
            Some(s) if s.starts_with("--env-file=") => {
                if cli.env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                cli.env_file = Some(PathBuf::from(path_str));
            }
            Some("--seed") => cli.seed = true,
            Some("--") => break,
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    Ok(cli)
}

fn configure_env(cli: &CliArgs) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = cli.env_file.clone() {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        let applied = env_file::load(&path)?;
        return Ok(Some(LoadedEnvFile {
            path,
            explicit: true,
            applied,
        }));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let default_path = cwd.join(".env");
    if !default_path.is_file() {
        return Ok(None);
    }
    let applied = env_file::load(&default_path)?;
    Ok(Some(LoadedEnvFile {
        path: default_path,
        explicit: false,
        applied,
    }))
}

fn main() {
    let (cli, loaded_env) = match parse_cli().and_then(|cli| configure_env(&cli).map(|env| (cli, env))) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!(
            "Environment loaded from {} .env file: {} ({} variable(s) applied)",
            origin,
            info.path.display(),
            info.applied
        );
    }

    info!(
        "carbon-footprint {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(&cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
