//! Errors for fleet tracker
use thiserror::Error;

use crate::map::LayerId;

#[derive(Error, Debug)]
pub enum FleetTrackerError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Invalid filter value: {0}")]
    InvalidFilter(String),

    #[error("Layer {0} is not attached to the map")]
    LayerRemoval(LayerId),
}
