//! HAP definitions for the garage door opener profile.
//!
//! This module is the typed counterpart of the characteristic definition
//! table: every characteristic type knows its UUID, format, permissions and
//! constraints, and the door/lock state enums map to their wire values.

use crate::constants::*;
use crate::error::Error;
use crate::types::{Constraints, Format, Permissions, Value};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Characteristic types used by the garage door opener accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicType {
    Identify,
    Manufacturer,
    Model,
    Name,
    SerialNumber,
    FirmwareRevision,
    CurrentDoorState,
    TargetDoorState,
    ObstructionDetected,
    LockCurrentState,
    LockTargetState,
}

impl CharacteristicType {
    /// Short HAP type (the first UUID segment).
    #[must_use]
    pub fn short_type(&self) -> u32 {
        match self {
            Self::Identify => TYPE_IDENTIFY,
            Self::Manufacturer => TYPE_MANUFACTURER,
            Self::Model => TYPE_MODEL,
            Self::Name => TYPE_NAME,
            Self::SerialNumber => TYPE_SERIAL_NUMBER,
            Self::FirmwareRevision => TYPE_FIRMWARE_REVISION,
            Self::CurrentDoorState => TYPE_CURRENT_DOOR_STATE,
            Self::TargetDoorState => TYPE_TARGET_DOOR_STATE,
            Self::ObstructionDetected => TYPE_OBSTRUCTION_DETECTED,
            Self::LockCurrentState => TYPE_LOCK_CURRENT_STATE,
            Self::LockTargetState => TYPE_LOCK_TARGET_STATE,
        }
    }

    /// Full Apple UUID of this characteristic type.
    #[must_use]
    pub fn uuid(&self) -> String {
        hap_uuid(self.short_type())
    }

    #[must_use]
    pub fn format(&self) -> Format {
        match self {
            Self::Identify | Self::ObstructionDetected => Format::Bool,
            Self::Manufacturer
            | Self::Model
            | Self::Name
            | Self::SerialNumber
            | Self::FirmwareRevision => Format::String,
            Self::CurrentDoorState
            | Self::TargetDoorState
            | Self::LockCurrentState
            | Self::LockTargetState => Format::Uint8,
        }
    }

    #[must_use]
    pub fn permissions(&self) -> Permissions {
        match self {
            Self::Identify => Permissions::WRITE,
            Self::Manufacturer
            | Self::Model
            | Self::Name
            | Self::SerialNumber
            | Self::FirmwareRevision => Permissions::READ,
            Self::CurrentDoorState | Self::ObstructionDetected | Self::LockCurrentState => {
                Permissions::READ | Permissions::NOTIFY
            }
            Self::TargetDoorState | Self::LockTargetState => {
                Permissions::READ | Permissions::WRITE | Permissions::NOTIFY
            }
        }
    }

    #[must_use]
    pub fn constraints(&self) -> Constraints {
        match self {
            Self::CurrentDoorState => Constraints::enumerated(0..=4),
            Self::TargetDoorState | Self::LockTargetState => Constraints::enumerated(0..=1),
            Self::LockCurrentState => Constraints::enumerated(0..=3),
            Self::Name => Constraints::max_len(DEFAULT_MAX_STRING_LENGTH),
            _ => Constraints::none(),
        }
    }

    /// Human readable description used in snapshots and logs.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identify => "Identify",
            Self::Manufacturer => "Manufacturer",
            Self::Model => "Model",
            Self::Name => "Name",
            Self::SerialNumber => "Serial Number",
            Self::FirmwareRevision => "Firmware Revision",
            Self::CurrentDoorState => "Current Door State",
            Self::TargetDoorState => "Target Door State",
            Self::ObstructionDetected => "Obstruction Detected",
            Self::LockCurrentState => "Lock Current State",
            Self::LockTargetState => "Lock Target State",
        }
    }
}

impl fmt::Display for CharacteristicType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Service types used by the garage door opener accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    AccessoryInformation,
    GarageDoorOpener,
}

impl ServiceType {
    #[must_use]
    pub fn short_type(&self) -> u32 {
        match self {
            Self::AccessoryInformation => TYPE_ACCESSORY_INFORMATION,
            Self::GarageDoorOpener => TYPE_GARAGE_DOOR_OPENER,
        }
    }

    #[must_use]
    pub fn uuid(&self) -> String {
        hap_uuid(self.short_type())
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AccessoryInformation => f.write_str("Accessory Information"),
            Self::GarageDoorOpener => f.write_str("Garage Door Opener"),
        }
    }
}

/// Accessory category advertised to controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessoryCategory {
    Other,
    Bridge,
    Fan,
    GarageDoorOpener,
    Lightbulb,
    DoorLock,
}

impl AccessoryCategory {
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Other => 1,
            Self::Bridge => 2,
            Self::Fan => 3,
            Self::GarageDoorOpener => 4,
            Self::Lightbulb => 5,
            Self::DoorLock => 6,
        }
    }
}

/// Current position/motion of the door (HAP 9.30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentDoorState {
    Open,
    Closed,
    Opening,
    Closing,
    /// Neither open nor closed; also the unknown-at-boot state.
    Stopped,
}

impl CurrentDoorState {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::Closed),
            2 => Some(Self::Opening),
            3 => Some(Self::Closing),
            4 => Some(Self::Stopped),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
            Self::Opening => 2,
            Self::Closing => 3,
            Self::Stopped => 4,
        }
    }

    /// Door is in motion.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// Door has settled (`open`, `closed` or `stopped`).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_moving()
    }
}

impl fmt::Display for CurrentDoorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

impl From<CurrentDoorState> for Value {
    fn from(state: CurrentDoorState) -> Self {
        Value::Uint8(state.to_u8())
    }
}

/// Requested door position (HAP 9.118).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDoorState {
    Open,
    Closed,
}

impl TargetDoorState {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::Closed),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
        }
    }

    /// Resting state the door reaches when this target is fulfilled.
    #[must_use]
    pub fn resting_state(&self) -> CurrentDoorState {
        match self {
            Self::Open => CurrentDoorState::Open,
            Self::Closed => CurrentDoorState::Closed,
        }
    }

    /// Motion state the door passes through towards this target.
    #[must_use]
    pub fn motion_state(&self) -> CurrentDoorState {
        match self {
            Self::Open => CurrentDoorState::Opening,
            Self::Closed => CurrentDoorState::Closing,
        }
    }

    /// Whether `current` already fulfils or is already heading to this target.
    #[must_use]
    pub fn is_consistent_with(&self, current: CurrentDoorState) -> bool {
        current == self.resting_state() || current == self.motion_state()
    }
}

impl fmt::Display for TargetDoorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

impl From<TargetDoorState> for Value {
    fn from(state: TargetDoorState) -> Self {
        Value::Uint8(state.to_u8())
    }
}

/// Current state of the door lock (HAP 9.52).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockCurrentState {
    Unsecured,
    Secured,
    Jammed,
    Unknown,
}

impl LockCurrentState {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unsecured),
            1 => Some(Self::Secured),
            2 => Some(Self::Jammed),
            3 => Some(Self::Unknown),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Secured => 1,
            Self::Jammed => 2,
            Self::Unknown => 3,
        }
    }
}

impl fmt::Display for LockCurrentState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Unsecured => "unsecured",
            Self::Secured => "secured",
            Self::Jammed => "jammed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl From<LockCurrentState> for Value {
    fn from(state: LockCurrentState) -> Self {
        Value::Uint8(state.to_u8())
    }
}

/// Requested state of the door lock (HAP 9.53).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTargetState {
    Unsecured,
    Secured,
}

impl LockTargetState {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unsecured),
            1 => Some(Self::Secured),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Secured => 1,
        }
    }

    /// Lock state this target settles into when it can be applied.
    #[must_use]
    pub fn settled_state(&self) -> LockCurrentState {
        match self {
            Self::Unsecured => LockCurrentState::Unsecured,
            Self::Secured => LockCurrentState::Secured,
        }
    }
}

impl fmt::Display for LockTargetState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unsecured => f.write_str("unsecured"),
            Self::Secured => f.write_str("secured"),
        }
    }
}

impl From<LockTargetState> for Value {
    fn from(state: LockTargetState) -> Self {
        Value::Uint8(state.to_u8())
    }
}

/// Pairing setup code (`XXX-XX-XXX`).
///
/// # Security
/// Comparison against a candidate code runs in constant time.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SetupCode(String);

impl SetupCode {
    /// Create a setup code after validating its shape.
    ///
    /// # Errors
    /// Returns `Error::Config` unless the code is eight digits in the
    /// `XXX-XX-XXX` layout.
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        let well_formed = code.len() == 10
            && code.chars().enumerate().all(|(i, c)| match i {
                3 | 6 => c == '-',
                _ => c.is_ascii_digit(),
            });
        if !well_formed {
            return Err(Error::Config(
                "Setup code must use the XXX-XX-XXX digit layout".to_string(),
            ));
        }
        Ok(SetupCode(code.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether HAP forbids this code as trivially guessable.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        TRIVIAL_SETUP_CODES.contains(&self.0.as_str())
    }

    /// Compare a candidate code in constant time.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.trim().as_bytes()).into()
    }
}

impl Default for SetupCode {
    fn default() -> Self {
        SetupCode(DEFAULT_SETUP_CODE.to_string())
    }
}

impl fmt::Debug for SetupCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SetupCode(***-**-***)")
    }
}

impl TryFrom<String> for SetupCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        SetupCode::new(&value)
    }
}

impl From<SetupCode> for String {
    fn from(code: SetupCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, CurrentDoorState::Open)]
    #[case(1, CurrentDoorState::Closed)]
    #[case(2, CurrentDoorState::Opening)]
    #[case(3, CurrentDoorState::Closing)]
    #[case(4, CurrentDoorState::Stopped)]
    fn test_current_door_state_wire_values(#[case] raw: u8, #[case] state: CurrentDoorState) {
        assert_eq!(CurrentDoorState::from_u8(raw), Some(state));
        assert_eq!(state.to_u8(), raw);
    }

    #[test]
    fn test_wire_values_out_of_range() {
        assert_eq!(CurrentDoorState::from_u8(5), None);
        assert_eq!(TargetDoorState::from_u8(2), None);
        assert_eq!(LockCurrentState::from_u8(4), None);
        assert_eq!(LockTargetState::from_u8(2), None);
    }

    #[test]
    fn test_lock_state_wire_values() {
        assert_eq!(LockCurrentState::Jammed.to_u8(), 2);
        assert_eq!(LockCurrentState::Unknown.to_u8(), 3);
        assert_eq!(LockTargetState::Secured.to_u8(), 1);
        assert_eq!(
            LockTargetState::Secured.settled_state(),
            LockCurrentState::Secured
        );
    }

    #[rstest]
    #[case(TargetDoorState::Closed, CurrentDoorState::Closed, true)]
    #[case(TargetDoorState::Closed, CurrentDoorState::Closing, true)]
    #[case(TargetDoorState::Closed, CurrentDoorState::Stopped, false)]
    #[case(TargetDoorState::Closed, CurrentDoorState::Open, false)]
    #[case(TargetDoorState::Open, CurrentDoorState::Opening, true)]
    #[case(TargetDoorState::Open, CurrentDoorState::Closing, false)]
    fn test_target_consistency(
        #[case] target: TargetDoorState,
        #[case] current: CurrentDoorState,
        #[case] consistent: bool,
    ) {
        assert_eq!(target.is_consistent_with(current), consistent);
    }

    #[test]
    fn test_door_terminal_states() {
        assert!(CurrentDoorState::Stopped.is_terminal());
        assert!(CurrentDoorState::Open.is_terminal());
        assert!(!CurrentDoorState::Closing.is_terminal());
    }

    #[test]
    fn test_characteristic_table() {
        let ty = CharacteristicType::TargetDoorState;
        assert_eq!(ty.format(), Format::Uint8);
        assert!(ty.permissions().writable());
        assert!(ty.permissions().notifiable());
        assert_eq!(ty.uuid(), "00000032-0000-1000-8000-0026BB765291");

        let identify = CharacteristicType::Identify;
        assert!(!identify.permissions().readable());
        assert!(identify.permissions().writable());

        let current = CharacteristicType::CurrentDoorState;
        assert!(!current.permissions().writable());
        assert!(current.constraints().check(&Value::Uint8(5)).is_err());
    }

    #[test]
    fn test_garage_category_code() {
        assert_eq!(AccessoryCategory::GarageDoorOpener.code(), 4);
    }

    #[rstest]
    #[case("111-11-111")]
    #[case("031-45-154")]
    #[case(" 482-91-736 ")]
    fn test_setup_code_valid(#[case] input: &str) {
        assert!(SetupCode::new(input).is_ok());
    }

    #[rstest]
    #[case("11111111")]
    #[case("111-11-11")]
    #[case("abc-de-fgh")]
    #[case("111_11_111")]
    fn test_setup_code_invalid(#[case] input: &str) {
        assert!(SetupCode::new(input).is_err());
    }

    #[test]
    fn test_setup_code_trivial_and_verify() {
        let code = SetupCode::default();
        assert!(code.is_trivial());
        assert!(code.verify("111-11-111"));
        assert!(!code.verify("111-11-112"));

        let strong = SetupCode::new("482-91-736").unwrap();
        assert!(!strong.is_trivial());
    }

    #[test]
    fn test_setup_code_debug_is_masked() {
        let code = SetupCode::new("482-91-736").unwrap();
        assert!(!format!("{code:?}").contains("482"));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&CurrentDoorState::Closing).unwrap();
        assert_eq!(json, "\"closing\"");
        let parsed: LockCurrentState = serde_json::from_str("\"jammed\"").unwrap();
        assert_eq!(parsed, LockCurrentState::Jammed);
    }
}
