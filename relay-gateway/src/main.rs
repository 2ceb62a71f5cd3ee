//! Entry point for the `relay-gateway` HTTP server.

use relay_gateway::{builtin::register_builtins, config::GatewayConfig, Gateway};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("relay-gateway: {e}");
            std::process::exit(2);
        }
    };

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut gateway = Gateway::new(config);
    if let Err(e) = register_builtins(&mut gateway) {
        tracing::error!(error = %e, "failed to register functions");
        std::process::exit(1);
    }

    let addr = gateway.config().listen_addr.clone();
    let auth = gateway.config().credentials.is_some();
    let functions = gateway.registered();
    let app = gateway.into_router();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, functions, basic_auth = auth, "relay-gateway listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
