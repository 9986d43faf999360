use anyhow::Context;
use fedor_core::Config;
use fedor_server::AppState;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(config_path: Option<&Path>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load(config_path).context("failed to load config")?;
    if let Some(port) = port {
        config.port = port;
    }
    let warnings = config.ensure_valid().context("refusing to start")?;
    for w in &warnings {
        warn!("config: {}", w.message);
    }

    info!(
        delay_secs = config.webhook_delay_secs,
        timeout_secs = config.run_timeout_secs,
        dummy = config.dummy_mode,
        label = config.required_label.as_deref().unwrap_or("-"),
        clone_dir = %config.clone_dir.display(),
        "starting fedor"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
            .await
            .with_context(|| format!("failed to bind port {}", config.port))?;
        let state = AppState::new(Arc::new(config));

        fedor_server::serve_on(state, listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C received, shutting down");
        })
        .await
    })
}
