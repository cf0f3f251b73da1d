//! Mounted tracking session
//!
//! Runs the bulk device fetch and the streaming channel side by side, feeding
//! both into a [`TrackingView`] until shutdown. Neither source waits for the
//! other.

use std::future::Future;

use tracing::{error, info, warn};

use crate::{
    channel::{ConnectionState, PositionChannel},
    errors::FleetTrackerError,
    map::MapSurface,
    models::Vehicle,
    view::TrackingView,
};

/// Transient user notifications
pub trait Notifier {
    fn notify(&self, message: &str);
}

/// Notifier that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Drive `view` from `devices` and `channel` until `shutdown` completes or
/// the channel stops
///
/// The channel is always closed before returning, which also cancels any
/// pending reconnect. Markers stay on the map until the view is unmounted.
pub async fn run<M, D, S>(
    view: &mut TrackingView<M>,
    mut channel: PositionChannel,
    devices: D,
    notifier: &dyn Notifier,
    shutdown: S,
) where
    M: MapSurface,
    D: Future<Output = Result<Vec<Vehicle>, FleetTrackerError>>,
    S: Future<Output = ()>,
{
    tokio::pin!(devices);
    tokio::pin!(shutdown);

    let mut devices_pending = true;
    let mut state = channel.state();
    let mut state_open = true;
    view.set_connection_state(*state.borrow_and_update());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down tracking session");
                break;
            }
            result = &mut devices, if devices_pending => {
                devices_pending = false;
                match result {
                    Ok(list) => view.seed_devices(list),
                    Err(e) => {
                        error!("Failed to load devices: {}", e);
                        notifier.notify("Could not load the device list");
                    }
                }
            }
            frame = channel.recv() => match frame {
                Some(frame) => view.apply_frame(frame),
                None => {
                    warn!("Position channel stopped");
                    break;
                }
            },
            changed = state.changed(), if state_open => {
                match changed {
                    Ok(()) => view.set_connection_state(*state.borrow_and_update()),
                    Err(_) => state_open = false,
                }
            }
        }
    }

    channel.close().await;
    view.set_connection_state(ConnectionState::Disconnected);
}
