//! Bridge daemon lifecycle and RPC plumbing.
//!
//! Everything the CLI needs to manage the hardware bridge daemon: the wire
//! protocol, a one-shot RPC client, liveness and readiness probing, pid-file
//! tracking, and the start/stop orchestration on top.
//!
//! ## Components
//!
//! - [`protocol`]: Request/Response types and newline-delimited JSON framing
//! - [`client`]: one-shot RPC client with per-call timeouts
//! - [`probe`]: liveness check and bounded readiness wait
//! - [`pidfile`]: advisory pid file and signal-0 process probe
//! - [`device`]: the device abstraction the daemon serves
//! - [`server`]: Unix socket listener and per-connection serve loop
//! - [`supervisor`]: start/stop/status/restart orchestration

pub mod client;
pub mod device;
pub mod pidfile;
pub mod probe;
pub mod protocol;
pub mod server;
pub mod supervisor;

pub use client::RpcClient;
pub use probe::RetryPolicy;
pub use server::BridgeListener;
pub use supervisor::{StartOutcome, StatusOutcome, StopOutcome};
