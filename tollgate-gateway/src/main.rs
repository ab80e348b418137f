//! Production tollgate payment gateway server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p tollgate-gateway --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p tollgate-gateway
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p tollgate-gateway
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override the bind address
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use tollgate::gate::SettlementHandle;
use tollgate::limiter::TokenBucket;
use tollgate::requirements::RequirementsBuilder;
use tollgate_http::{FacilitatorClient, PaymentGateway};
use tollgate_svm::provider::RpcProvider;
use tollgate_svm::{ChainSettler, ChainVerifier};

use tollgate_gateway::challenge::FacilitatorChallenger;
use tollgate_gateway::config::GatewayConfig;
use tollgate_gateway::routes::{self, AppState};
use tollgate_gateway::settlement;
use tollgate_gateway::settler::{GatewaySettler, SettlementLedger};
use tollgate_gateway::upstream::UpstreamClient;
use tollgate_gateway::verifier::GatewayVerifier;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Gateway failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        network = %config.payment.network,
        recipient = %config.payment.pay_to,
        "Loaded configuration"
    );

    let payment = Arc::new(config.payment.clone());
    let facilitator = Arc::new(FacilitatorClient::new(
        &config.facilitator.url,
        Duration::from_millis(config.facilitator.timeout_ms),
    )?);

    let confirm_timeout = Duration::from_millis(config.rpc.confirm_timeout_ms);
    let call_timeout = Duration::from_millis(config.rpc.call_timeout_ms);

    let ledger = Arc::new(SettlementLedger::new());
    let verifier = Arc::new(GatewayVerifier::new(
        Arc::clone(&facilitator),
        Arc::new(ChainVerifier::new(RpcProvider::new(
            &config.rpc.url,
            confirm_timeout,
        ))),
        Arc::clone(&ledger),
        call_timeout,
    ));
    let settler = GatewaySettler::new(
        Arc::clone(&facilitator),
        Arc::new(ChainSettler::new(RpcProvider::new(
            &config.rpc.url,
            confirm_timeout,
        ))),
        Arc::clone(&ledger),
        // Local settlement includes confirmation polling.
        confirm_timeout + call_timeout,
    );

    let (settlements, jobs) = SettlementHandle::channel(config.settlement.queue_depth);
    let worker = settlement::spawn_worker(jobs, settler);

    let challenger = Arc::new(FacilitatorChallenger::new(
        Arc::clone(&facilitator),
        RequirementsBuilder::new(Arc::clone(&payment)),
    ));
    let gateway = PaymentGateway::new(verifier, challenger, settlements, Arc::clone(&payment));

    let state = AppState {
        limiter: Arc::new(TokenBucket::new(config.limiter.to_config())),
        upstream: Arc::new(UpstreamClient::new(
            &config.upstream.url,
            Duration::from_millis(config.upstream.timeout_ms),
        )?),
    };

    let app = Router::new()
        .route("/data/address/{address}", get(routes::address_data))
        .layer(
            gateway
                .with_price(config.pricing.address_data)
                .with_description("blockchain address data"),
        )
        .route("/health", get(routes::health))
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        )
        .with_state(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Draining settlement worker");
    let _ = tokio::time::timeout(Duration::from_secs(30), worker).await;
    tracing::info!("Gateway shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
