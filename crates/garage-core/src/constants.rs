//! Core constants for the garage door opener accessory.
//!
//! Values here come from the HomeKit Accessory Protocol definitions for the
//! Garage Door Opener service (HAP section 8.16) and the characteristics it
//! carries, plus the defaults used when no configuration is supplied.
//!
//! # Usage
//!
//! ```
//! use garage_core::constants::*;
//!
//! assert_eq!(hap_uuid(TYPE_CURRENT_DOOR_STATE), "0000000E-0000-1000-8000-0026BB765291");
//! assert_eq!(DEFAULT_MAX_STRING_LENGTH, 64);
//! ```

// ============================================================================
// HAP type identifiers (short form of the Apple-defined UUIDs)
// ============================================================================

/// Suffix shared by every Apple-defined HAP type UUID.
pub const HAP_BASE_UUID_SUFFIX: &str = "-0000-1000-8000-0026BB765291";

/// Accessory Information service.
pub const TYPE_ACCESSORY_INFORMATION: u32 = 0x3E;

/// Garage Door Opener service.
pub const TYPE_GARAGE_DOOR_OPENER: u32 = 0x41;

/// Identify characteristic (write-only, bool).
pub const TYPE_IDENTIFY: u32 = 0x14;

/// Manufacturer characteristic.
pub const TYPE_MANUFACTURER: u32 = 0x20;

/// Model characteristic.
pub const TYPE_MODEL: u32 = 0x21;

/// Name characteristic.
pub const TYPE_NAME: u32 = 0x23;

/// Serial Number characteristic.
pub const TYPE_SERIAL_NUMBER: u32 = 0x30;

/// Firmware Revision characteristic.
pub const TYPE_FIRMWARE_REVISION: u32 = 0x52;

/// Current Door State characteristic (uint8, 0..=4).
pub const TYPE_CURRENT_DOOR_STATE: u32 = 0x0E;

/// Target Door State characteristic (uint8, 0..=1).
pub const TYPE_TARGET_DOOR_STATE: u32 = 0x32;

/// Obstruction Detected characteristic (bool).
pub const TYPE_OBSTRUCTION_DETECTED: u32 = 0x24;

/// Lock Current State characteristic (uint8, 0..=3).
pub const TYPE_LOCK_CURRENT_STATE: u32 = 0x1D;

/// Lock Target State characteristic (uint8, 0..=1).
pub const TYPE_LOCK_TARGET_STATE: u32 = 0x1E;

/// Expand a short HAP type into the full Apple UUID string.
#[must_use]
pub fn hap_uuid(short: u32) -> String {
    format!("{short:08X}{HAP_BASE_UUID_SUFFIX}")
}

// ============================================================================
// Value limits
// ============================================================================

/// Default maximum length of a HAP string value.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 64;

/// Hard upper bound on the `maxLen` metadata of a HAP string.
pub const ABSOLUTE_MAX_STRING_LENGTH: usize = 256;

// ============================================================================
// Accessory defaults
// ============================================================================

/// Accessory id of the single accessory exposed by the server.
pub const DEFAULT_ACCESSORY_ID: u64 = 1;

/// Instance id of the first service; HAP reserves 1 for Accessory Information.
pub const FIRST_INSTANCE_ID: u64 = 1;

pub const DEFAULT_NAME: &str = "GarageDoorOpener-01";
pub const DEFAULT_MANUFACTURER: &str = "Arduino HomeKit";
pub const DEFAULT_SERIAL_NUMBER: &str = "0123456";
pub const DEFAULT_MODEL: &str = "ESP8266/ESP32";
pub const DEFAULT_FIRMWARE_REVISION: &str = "1.0";

/// Pairing setup code shipped with the reference accessory.
pub const DEFAULT_SETUP_CODE: &str = "111-11-111";

/// Setup codes HAP forbids because they are trivially guessable.
pub const TRIVIAL_SETUP_CODES: [&str; 12] = [
    "000-00-000",
    "111-11-111",
    "222-22-222",
    "333-33-333",
    "444-44-444",
    "555-55-555",
    "666-66-666",
    "777-77-777",
    "888-88-888",
    "999-99-999",
    "123-45-678",
    "876-54-321",
];

// ============================================================================
// Timing defaults (milliseconds)
// ============================================================================

/// Maximum time the door may spend opening or closing before the move is
/// declared failed.
pub const DEFAULT_DOOR_TRAVEL_TIMEOUT_MS: u64 = 30_000;

/// Maximum time the lock actuator may take to engage or release.
pub const DEFAULT_LOCK_ACTUATION_TIMEOUT_MS: u64 = 5_000;

/// Travel time of the simulated door used by the mock actuator.
pub const DEFAULT_SIMULATED_TRAVEL_MS: u64 = 2_000;

// ============================================================================
// Capacities
// ============================================================================

/// Maximum number of state transitions kept in a machine's history.
pub const MAX_HISTORY_SIZE: usize = 100;

/// Capacity of the engine event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Capacity of the engine command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;
