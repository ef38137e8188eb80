//! Device abstraction served by the bridge daemon.
//!
//! The daemon fronts exactly one device. [`Device`] is the seam between RPC
//! dispatch and the hardware: built-in methods (ping, status, shutdown) are
//! handled by the daemon itself, everything else is forwarded here.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors a device can report for a forwarded method call.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Hardware-level failure; the message travels back to the caller.
    #[error("{0}")]
    Failed(String),
}

/// A device the daemon can drive over RPC.
///
/// Method dispatch is by name: the daemon does not know the device's method
/// surface, it only forwards what the built-ins did not claim. `connected`
/// feeds the daemon's status response.
pub trait Device: Send + 'static {
    /// Whether the device link is currently established.
    fn connected(&self) -> bool;

    /// Invoke a device method by name.
    fn call(
        &mut self,
        method: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, DeviceError>;
}

/// Placeholder device with no hardware behind it.
///
/// Understands connect and disconnect, which only flip the connection flag,
/// and rejects everything else. This lets the full lifecycle (start, probe,
/// status, shutdown) run on machines without the bridge hardware attached.
#[derive(Debug, Default)]
pub struct NullDevice {
    connected: bool,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Device for NullDevice {
    fn connected(&self) -> bool {
        self.connected
    }

    fn call(
        &mut self,
        method: &str,
        _args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, DeviceError> {
        match method {
            "connect" => {
                self.connected = true;
                Ok(Value::Null)
            }
            "disconnect" => {
                self.connected = false;
                Ok(Value::Null)
            }
            other => Err(DeviceError::UnknownMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_device_starts_disconnected() {
        assert!(!NullDevice::new().connected());
    }

    #[test]
    fn test_connect_and_disconnect_flip_the_flag() {
        let mut device = NullDevice::new();

        let result = device.call("connect", &[], &Map::new()).unwrap();
        assert_eq!(result, Value::Null);
        assert!(device.connected());

        device.call("disconnect", &[], &Map::new()).unwrap();
        assert!(!device.connected());
    }

    #[test]
    fn test_hardware_methods_are_rejected() {
        let mut device = NullDevice::new();
        let err = device.call("set_led", &[], &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "unknown method: set_led");
    }
}
