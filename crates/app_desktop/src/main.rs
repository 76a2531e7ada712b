use std::sync::Arc;
use std::{fs, path::Path};

use anyhow::Result;
use app_desktop::shell::WindowShell;
use config::{AppConfig, ConfigStore};
use core_types::WindowManager;
use ipc_bridge::{BridgeClient, NoteBridge};
use note_cache::NoteCache;
use storage_sqlite::NoteStorage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    data_dir.push("notelet");
    if let Err(err) = fs::create_dir_all(&data_dir) {
        eprintln!("failed to prepare data dir: {err}");
    }
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    let config_store = ConfigStore::from_dir(data_dir.join("config"));
    let config = match config_store.load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err}");
            AppConfig::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to create tokio runtime: {err}");
            return;
        }
    };

    if let Err(err) = runtime.block_on(run(&data_dir, &config)) {
        error!("bootstrap failed: {err:#}");
    }
}

async fn run(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let storage = NoteStorage::connect(data_dir.join("notelet.db")).await?;
    info!(
        schema_version = storage.schema_version().await?,
        "storage ready"
    );

    let shell = Arc::new(WindowShell::new());
    let bridge = Arc::new(NoteBridge::new(storage, shell.clone()));

    let main_window = shell.open_main();
    let api = Arc::new(BridgeClient::new(bridge, main_window));
    let cache = NoteCache::new(api, config.debounce());
    cache.load().await;
    info!(notes = cache.notes().len(), "main window mounted");

    // The view layer drives the cache from here. Shutting down mirrors a
    // window close: flush pending edits, then release the window.
    if config.flush_on_close {
        cache.dispose().await;
    }
    shell.close_window(main_window)?;
    Ok(())
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "notelet.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,app_desktop=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}
