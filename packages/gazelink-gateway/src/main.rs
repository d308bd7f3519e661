use std::sync::Arc;

use etrack_rs::SimulatedFinder;
use gazelink_gateway::{handle_connection, GatewayConfig, GatewayState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gazelink_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Gazelink gateway");

    let config = GatewayConfig::from_env()?;

    // The simulated backend stands in for the vendor SDK binding; swap the
    // finder to target real hardware.
    let finder = Arc::new(SimulatedFinder::with_start_frequency(config.sim_start_freq)?);
    let state = GatewayState::new(finder, config.license_file.clone());

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("🎧 Listening on ws://{}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        // Nagle off: the sample stream favors latency over throughput
        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, "failed to disable send coalescing: {e}");
        }
        tokio::spawn(handle_connection(stream, state.clone()));
    }
}
