use mimalloc::MiMalloc;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tabula_console::config::Config;
use tabula_console::db::provider::{self, ProviderSettings};
use tabula_console::router::{ConsoleState, console_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.basic.listen_addr,
        connect_target = %cfg.database.connect_target,
        pool_size = cfg.database.pool_size,
        identifying_column = %cfg.database.identifying_column,
        loglevel = %cfg.basic.loglevel
    );

    let settings = ProviderSettings::from_config(&cfg.database)?;
    let handle = provider::spawn(settings).await?;

    // Build axum router and serve
    let state = ConsoleState::new(handle.clone(), &cfg)?;
    let app = console_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Terminating");
    if handle.close(cfg.database.close_grace()).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
