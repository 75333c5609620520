//! Error types for actuator operations.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Failures of the physical layer.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The device, or the channel to it, is gone.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The door refused to move because its safety sensor is tripped.
    #[error("Door obstructed")]
    Obstructed,
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }
}
