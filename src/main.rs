//! SignLink APIサーバー

use anyhow::Context;
use std::path::PathBuf;

use signlink::api::{run_server, AppState};
use signlink::db::Database;
use signlink::logging::init_logging;
use signlink::model::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_or_default().with_env_overrides();

    // ガードはmain終了まで保持
    let _log_guard = init_logging(
        &config.logging.level,
        config.logging.json,
        config.logging.dir.as_ref().map(PathBuf::from),
    );

    let db = Database::connect(config.database_url()?, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    let state = AppState::from_config(&config, db)?;

    run_server(state, &config.server, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        // シグナルを待てない場合は止まらずに動き続ける
        std::future::pending::<()>().await;
    }
}
