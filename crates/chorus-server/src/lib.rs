//! # chorus-server
//!
//! WebSocket edge of the relay. Every client shares one upstream session:
//! client frames are routed up through [`websocket::router::MessageRouter`],
//! model audio comes back through [`bridge::UpstreamBridge`] and is fanned
//! out by [`websocket::broadcast::Broadcaster`] to every member of the
//! [`websocket::registry::ConnectionRegistry`].

#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
