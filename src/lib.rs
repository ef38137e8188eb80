//! hwbridge - lifecycle manager and RPC client for the hardware bridge daemon
//!
//! The bridge daemon (`hwbridged`) owns a privileged hardware session and
//! serves it over a Unix domain socket. This crate is the other half: the
//! `hwbridge` CLI that starts, stops and inspects that daemon, plus the RPC
//! client, probing and process-tracking layers it is built from.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;

pub use error::{BridgeError, ClientError, Result};
