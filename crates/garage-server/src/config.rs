//! Static accessory configuration.

use garage_core::constants::{
    DEFAULT_ACCESSORY_ID, DEFAULT_COMMAND_CAPACITY, DEFAULT_DOOR_TRAVEL_TIMEOUT_MS,
    DEFAULT_EVENT_CAPACITY, DEFAULT_FIRMWARE_REVISION, DEFAULT_LOCK_ACTUATION_TIMEOUT_MS,
    DEFAULT_MANUFACTURER, DEFAULT_MAX_STRING_LENGTH, DEFAULT_MODEL, DEFAULT_NAME,
    DEFAULT_SERIAL_NUMBER,
};
use garage_core::{AccessoryId, CurrentDoorState, Error, Result, SetupCode, TargetDoorState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the accessory needs at startup. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryConfig {
    pub accessory_id: u64,
    pub name: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub model: String,
    pub firmware_revision: String,
    pub setup_code: SetupCode,

    /// Door position at startup. Motion states are treated as `stopped`.
    pub initial_door_state: CurrentDoorState,
    pub initial_door_target: TargetDoorState,

    pub door_travel_timeout_ms: u64,
    pub lock_actuation_timeout_ms: u64,

    /// Pending target writes the engine accepts before rejecting new ones.
    pub command_capacity: usize,
    /// Engine events buffered per `events()` receiver.
    pub event_capacity: usize,
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            accessory_id: DEFAULT_ACCESSORY_ID,
            name: DEFAULT_NAME.to_string(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            serial_number: DEFAULT_SERIAL_NUMBER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            firmware_revision: DEFAULT_FIRMWARE_REVISION.to_string(),
            setup_code: SetupCode::default(),
            initial_door_state: CurrentDoorState::Stopped,
            initial_door_target: TargetDoorState::Closed,
            door_travel_timeout_ms: DEFAULT_DOOR_TRAVEL_TIMEOUT_MS,
            lock_actuation_timeout_ms: DEFAULT_LOCK_ACTUATION_TIMEOUT_MS,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AccessoryConfig {
    pub fn aid(&self) -> AccessoryId {
        AccessoryId::new(self.accessory_id)
    }

    pub fn door_travel_timeout(&self) -> Duration {
        Duration::from_millis(self.door_travel_timeout_ms)
    }

    pub fn lock_actuation_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_actuation_timeout_ms)
    }

    /// # Errors
    /// `Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.accessory_id == 0 {
            return Err(Error::Config("accessory_id must be at least 1".into()));
        }

        let strings = [
            ("name", &self.name),
            ("manufacturer", &self.manufacturer),
            ("serial_number", &self.serial_number),
            ("model", &self.model),
            ("firmware_revision", &self.firmware_revision),
        ];
        for (field, value) in strings {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
            if value.chars().count() > DEFAULT_MAX_STRING_LENGTH {
                return Err(Error::Config(format!(
                    "{field} exceeds {DEFAULT_MAX_STRING_LENGTH} characters"
                )));
            }
        }

        if self.door_travel_timeout_ms == 0 || self.lock_actuation_timeout_ms == 0 {
            return Err(Error::Config("actuator timeouts must be positive".into()));
        }
        if self.command_capacity == 0 || self.event_capacity == 0 {
            return Err(Error::Config("channel capacities must be positive".into()));
        }
        Ok(())
    }
}
