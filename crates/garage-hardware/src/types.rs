//! Common types shared across actuator implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "Mock Door", "Relay Board").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional device serial number.
    pub serial_number: Option<String>,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            serial_number: None,
            firmware_version: None,
        }
    }

    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// End position of the door travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorPosition {
    Open,
    Closed,
}

impl fmt::Display for DoorPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Command issued to an actuator, as recorded by the mock devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorCommand {
    /// Drive the door towards a position.
    Move(DoorPosition),
    /// Halt door motion.
    Stop,
    /// Throw the lock bolt.
    Engage,
    /// Retract the lock bolt.
    Release,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_builder() {
        let info = DeviceInfo::new("Mock Door", "Mock Door Opener v1.0")
            .with_serial_number("0123456")
            .with_firmware_version("1.0.0");

        assert_eq!(info.name, "Mock Door");
        assert_eq!(info.serial_number, Some("0123456".to_string()));
        assert_eq!(info.firmware_version, Some("1.0.0".to_string()));
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_string(&ActuatorCommand::Move(DoorPosition::Closed)).unwrap();
        assert_eq!(json, "{\"move\":\"closed\"}");
        let parsed: ActuatorCommand = serde_json::from_str("\"engage\"").unwrap();
        assert_eq!(parsed, ActuatorCommand::Engage);
    }
}
