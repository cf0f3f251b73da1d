//! Streaming position/device channel
//!
//! Keeps one socket to the tracking backend open, reconnecting whenever it
//! closes, and hands parsed frames to the owner over a queue.

use std::future::Future;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::{
    config::{ChannelConfig, ReconnectMode, ServerConfig},
    errors::FleetTrackerError,
    models::Frame,
};

/// Text frames of one open connection; the stream ends when it closes
pub type FrameStream = BoxStream<'static, Result<String, FleetTrackerError>>;

/// Opens connections to the streaming endpoint
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FrameStream, FleetTrackerError>> + Send;
}

/// WebSocket connector
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FrameStream, FleetTrackerError>> + Send {
        let url = url.to_string();
        async move {
            let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let frames = socket.filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(FleetTrackerError::from(e))),
                }
            });
            Ok(frames.boxed())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

/// Delay before the next connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Fixed(Duration),
    Backoff { initial: Duration, max: Duration },
}

impl ReconnectPolicy {
    /// `failures` counts connection attempts that failed since the last
    /// successful open
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Backoff { initial, max } => initial
                .checked_mul(2u32.saturating_pow(failures))
                .map_or(max, |delay| delay.min(max)),
        }
    }
}

impl From<&ChannelConfig> for ReconnectPolicy {
    fn from(config: &ChannelConfig) -> Self {
        match config.reconnect {
            ReconnectMode::Fixed => ReconnectPolicy::Fixed(config.reconnect_delay),
            ReconnectMode::Backoff => ReconnectPolicy::Backoff {
                initial: config.reconnect_delay,
                max: config.max_reconnect_delay.max(config.reconnect_delay),
            },
        }
    }
}

pub struct ChannelBuilder<C> {
    connector: C,
    url: String,
    policy: ReconnectPolicy,
    buffer: usize,
}

/// Handle to the running channel
///
/// Dropping it, or calling [`PositionChannel::close`], closes the socket and
/// cancels a pending reconnect.
pub struct PositionChannel {
    rx: mpsc::Receiver<Frame>,
    state: watch::Receiver<ConnectionState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ChannelBuilder<WebSocketConnector> {
    pub fn new(server: &ServerConfig, channel: &ChannelConfig) -> Self {
        Self {
            connector: WebSocketConnector,
            url: server.socket_url(),
            policy: ReconnectPolicy::from(channel),
            buffer: channel.buffer,
        }
    }
}

impl<C: Connector> ChannelBuilder<C> {
    pub fn with_connector<D: Connector>(self, connector: D) -> ChannelBuilder<D> {
        ChannelBuilder {
            connector,
            url: self.url,
            policy: self.policy,
            buffer: self.buffer,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start the connection task
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(self) -> PositionChannel {
        let (tx, rx) = mpsc::channel(self.buffer.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(Self::process_events(
            self.connector,
            self.url,
            self.policy,
            tx,
            state_tx,
            shutdown_rx,
        ));

        PositionChannel {
            rx,
            state,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    /// Connection loop
    ///
    /// A failed attempt, a transport error and a clean close all end up in the
    /// same place: state goes to disconnected and a new attempt is made after
    /// the policy delay. The loop only stops on shutdown or when the receiving
    /// side is gone.
    async fn process_events(
        connector: C,
        url: String,
        policy: ReconnectPolicy,
        tx: mpsc::Sender<Frame>,
        state: watch::Sender<ConnectionState>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut failures: u32 = 0;

        'session: loop {
            info!("Connecting to {}", url);
            let connected = tokio::select! {
                _ = &mut shutdown => break 'session,
                result = connector.connect(&url) => result,
            };

            match connected {
                Ok(mut frames) => {
                    info!("Connected to {}", url);
                    state.send_replace(ConnectionState::Connected);
                    failures = 0;

                    loop {
                        let item = tokio::select! {
                            _ = &mut shutdown => break 'session,
                            item = frames.next() => item,
                        };
                        match item {
                            Some(Ok(text)) => {
                                let delivered = tokio::select! {
                                    _ = &mut shutdown => break 'session,
                                    delivered = Self::dispatch(&tx, &text) => delivered,
                                };
                                if !delivered {
                                    info!("Frame receiver dropped, stopping channel");
                                    break 'session;
                                }
                            }
                            Some(Err(e)) => {
                                error!("Channel error: {}", e);
                                break;
                            }
                            None => {
                                info!("Connection to {} closed", url);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to connect to {}: {}", url, e);
                    failures = failures.saturating_add(1);
                }
            }

            state.send_replace(ConnectionState::Disconnected);
            let delay = policy.delay(failures);
            info!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = &mut shutdown => break 'session,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        state.send_replace(ConnectionState::Disconnected);
        info!("Channel to {} shut down", url);
    }

    /// Parse a text frame and forward it, returns false once nobody listens
    async fn dispatch(tx: &mpsc::Sender<Frame>, text: &str) -> bool {
        let frames = match Frame::parse(text) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return true;
            }
        };

        for frame in frames {
            if tx.send(frame).await.is_err() {
                return false;
            }
        }
        true
    }
}

impl PositionChannel {
    /// Receive the next frame, None once the channel has shut down
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to connection state changes
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the socket, cancel any pending reconnect and wait for the task
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        // Unblocks a task parked on a full queue
        self.rx.close();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Channel task failed: {}", e);
            }
        }
    }
}

impl Drop for PositionChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
