// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay Service
//!
//! Contact form intake in front of a mail relay.
//!
//! ## Routes
//!
//! - `GET /api/submit`: redirects to the status view
//! - `POST /api/submit`: JSON form submission
//! - `GET /api/status`: count of accepted submissions
//! - `GET /health`, `GET /healthz`, `GET /metrics`
//!
//! ## Configuration
//!
//! Defaults, then the TOML file named by `CONTACT_RELAY_CONFIG`, then
//! `CONTACT_RELAY__*` variables, then the flat variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:3000)
//! - `EMAIL_TO`: Recipient of every submission
//! - `MAX_REQUESTS`: Submissions per client per window (default: 1000)
//! - `ACCESS_KEY`: Require this shared key in `access_key`

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_relay::{
    clock::{Clock, SystemClock},
    config::Config,
    handlers::{router, AppState},
    mailer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        require_access_key = config.policy.require_access_key,
        fixed_reply_to = config.policy.fixed_reply_to.is_some(),
        conditional_mode = ?config.policy.conditional_mode,
        mail_backend = ?config.mail.backend,
        "Starting contact relay"
    );

    // Create application state
    let mailer = mailer::from_config(&config.mail)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState::new(config.clone(), mailer, clock.clone())?);

    // Spawn sweep task
    let sweep_state = state.clone();
    let sweep_every = config.rate_limit.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let removed = sweep_state.pipeline.limiter().sweep(clock.now()).await;
            let tracked = sweep_state.pipeline.limiter().tracked_clients().await;
            sweep_state.metrics.set_tracked_clients(tracked);
            debug!(removed, tracked, "Swept expired rate limit windows");
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
