mod backend;
mod claim;
mod config;
mod error;
mod lifecycle;
mod loopback;
#[cfg(test)]
mod mock;
#[cfg(feature = "native-backend")]
mod native;
mod panel;
mod routes;
mod session;
mod types;
mod verifier;

use std::sync::Arc;

use crate::backend::ProvingBackend;
use crate::config::{BackendKind, Config};
use crate::loopback::LoopbackBackend;
use crate::routes::{build_router, AppState};
use crate::session::spawn_session;

fn select_backend(config: &Config) -> Result<Arc<dyn ProvingBackend>, String> {
    match config.backend {
        BackendKind::Loopback => {
            tracing::warn!(
                "Using loopback backend (min_deposit={}); proofs are NOT cryptographic",
                config.min_deposit
            );
            Ok(Arc::new(LoopbackBackend::new(config.min_deposit)))
        }
        #[cfg(feature = "native-backend")]
        BackendKind::Native => Ok(Arc::new(native::NativeBackend)),
        #[cfg(not(feature = "native-backend"))]
        BackendKind::Native => Err(
            "Native backend requires the 'native-backend' feature. Build with: cargo build --features native-backend"
                .to_string(),
        ),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spark_prover=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env()?;
    tracing::info!(
        "Starting deposit prover: backend={} queue_depth={}",
        config.backend,
        config.queue_depth
    );

    let backend = select_backend(&config)?;
    let session = spawn_session(backend, config.queue_depth)
        .map_err(|e| format!("Failed to start proof worker: {}", e))?;

    let state = Arc::new(AppState::new(session.clone()));
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;
    tracing::info!("Deposit prover listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e));

    // Release any held proof before the process exits.
    session.shutdown().await;
    served
}
