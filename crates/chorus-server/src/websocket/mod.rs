//! Client connections, the live set, message routing and audio fan-out.

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod router;
pub mod session;
