//! Live fleet tracking
//!
//! Keeps a map of vehicle markers in sync with a tracking backend: a bulk
//! device listing seeds the registry, a streaming socket pushes device and
//! position updates, and every change re-renders the markers.

pub mod api;
pub mod channel;
pub mod config;
pub mod errors;
pub mod filter;
pub mod map;
pub mod marker;
pub mod models;
pub mod positions;
pub mod registry;
pub mod session;
pub mod status;
pub mod view;
