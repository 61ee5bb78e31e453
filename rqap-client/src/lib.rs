//! # rqap-client
//!
//! Async TCP client for Rserve-compatible R compute servers.
//!
//! This crate provides:
//! - Connection management with connect/request timeouts
//! - The strict one-request-one-reply exchange of the wire protocol
//! - Error-path draining of the server's trailing message
//! - High-level `eval` / `eval_void` / `assign` wrappers

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
