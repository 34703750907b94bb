//! # chorus-core
//!
//! Foundation types shared by every chorus crate.
//!
//! - **Branded IDs**: [`ids::ConnectionId`] as a newtype so a connection ID is
//!   never confused with any other string
//! - **Constants**: package name and version
//! - **Logging**: `tracing` subscriber setup and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;
