//! Fleet tracker

use fleet_tracker::{
    api::DeviceApi,
    channel::ChannelBuilder,
    config::AppConfig,
    errors::FleetTrackerError,
    map::{HeadlessMap, LatLng},
    session::{self, LogNotifier},
    view::TrackingView,
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), FleetTrackerError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let api = DeviceApi::new(&config.server)?;
    let map = HeadlessMap::new(LatLng::default(), 2.0);
    let mut view = TrackingView::from_config(map, &config);

    // Mount: the socket and the device listing start together
    let channel = ChannelBuilder::new(&config.server, &config.channel).connect();
    info!("Tracking {}", config.server.socket_url());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    session::run(
        &mut view,
        channel,
        api.fetch_devices(),
        &LogNotifier,
        shutdown,
    )
    .await;

    let rows = view.rows();
    let map = view.unmount();
    info!(
        "Tracked {} vehicles, {} layers left on map",
        rows.len(),
        map.layer_count()
    );

    Ok(())
}
