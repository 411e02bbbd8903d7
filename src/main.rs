// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discourse_sso_bridge::api::router;
use discourse_sso_bridge::config::{BridgeConfig, LogFormat};
use discourse_sso_bridge::identity::OidcIdentity;
use discourse_sso_bridge::sso::DISCOURSE;
use discourse_sso_bridge::state::AppState;

fn init_tracing(config: &BridgeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match BridgeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);
    info!(
        vocabulary = DISCOURSE.version,
        forum = %config.discourse_url,
        "Starting Discourse SSO bridge"
    );

    for secret in config.dummy_secrets() {
        warn!(variable = secret, "Using the published dummy value; set a real secret");
    }

    let identity = match OidcIdentity::connect(&config).await {
        Ok(identity) => identity,
        Err(e) => {
            error!(error = %e, "Failed to initialize OpenID Connect provider");
            return ExitCode::FAILURE;
        }
    };

    let addr = config.bind_addr();
    let state = match AppState::new(&config, Arc::new(identity)) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize application state");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "Discourse SSO bridge listening");

    if let Err(e) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
