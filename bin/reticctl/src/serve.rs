//! ---
//! retic_section: "05-networking-external-interfaces"
//! retic_subsection: "binary"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Command-line front end for radial network analysis."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use retic_calc_engine::{api, Analyzer};
use retic_logging::{log_system_event, LogContext, SystemEventOutcome};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Socket address to bind; defaults to `[api] listen` from the configuration.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,
}

pub fn run(analyzer: Analyzer, addr: SocketAddr) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(serve(Arc::new(analyzer), addr))
}

async fn serve(analyzer: Arc<Analyzer>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    let ctx = LogContext::new().with_pass("api");
    log_system_event(
        Some(&ctx),
        "api.listen",
        &format!("listening on {addr}"),
        SystemEventOutcome::Success,
    );

    let result = axum::serve(listener, api::router(analyzer))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await;

    if let Err(err) = &result {
        log_system_event(
            Some(&ctx),
            "api.listen",
            &format!("server exited with error: {err}"),
            SystemEventOutcome::Fault,
        );
    }
    result.context("api server failed")
}
