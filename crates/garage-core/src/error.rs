use thiserror::Error;

use crate::types::CharacteristicId;

/// HAP status codes reported to controllers alongside a failed request.
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const INSUFFICIENT_PRIVILEGES: i32 = -70401;
    pub const SERVICE_COMMUNICATION_FAILURE: i32 = -70402;
    pub const RESOURCE_BUSY: i32 = -70403;
    pub const READ_ONLY_CHARACTERISTIC: i32 = -70404;
    pub const WRITE_ONLY_CHARACTERISTIC: i32 = -70405;
    pub const NOTIFICATION_NOT_SUPPORTED: i32 = -70406;
    pub const OUT_OF_RESOURCES: i32 = -70407;
    pub const OPERATION_TIMED_OUT: i32 = -70408;
    pub const RESOURCE_DOES_NOT_EXIST: i32 = -70409;
    pub const INVALID_VALUE_IN_REQUEST: i32 = -70410;
    pub const INSUFFICIENT_AUTHORIZATION: i32 = -70411;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Characteristic access errors
    #[error("Invalid value for characteristic {characteristic}: {reason}")]
    InvalidValue {
        characteristic: CharacteristicId,
        reason: String,
    },

    #[error("Characteristic {0} is not readable")]
    NotReadable(CharacteristicId),

    #[error("Characteristic {0} is not writable")]
    NotWritable(CharacteristicId),

    #[error("Characteristic {0} does not support notifications")]
    NotNotifiable(CharacteristicId),

    #[error("Unknown characteristic: {0}")]
    UnknownCharacteristic(CharacteristicId),

    #[error("Write to characteristic {characteristic} rejected: {reason}")]
    RejectedByHandler {
        characteristic: CharacteristicId,
        reason: String,
    },

    // State machine errors
    #[error("Transition failed: {reason}")]
    TransitionFailed { reason: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Notification errors
    #[error("Notification delivered to {delivered} of {attempted} subscribers")]
    PartialNotifyFailure { delivered: usize, attempted: usize },

    #[error("Accessory engine is not running")]
    EngineStopped,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Create an invalid value error for a characteristic.
    pub fn invalid_value(characteristic: CharacteristicId, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            characteristic,
            reason: reason.into(),
        }
    }

    /// Create a handler rejection error for a characteristic.
    pub fn rejected(characteristic: CharacteristicId, reason: impl Into<String>) -> Self {
        Self::RejectedByHandler {
            characteristic,
            reason: reason.into(),
        }
    }

    /// Create a transition failure error.
    pub fn transition_failed(reason: impl Into<String>) -> Self {
        Self::TransitionFailed {
            reason: reason.into(),
        }
    }

    /// HAP status code a protocol encoder should report for this error.
    #[must_use]
    pub fn hap_status(&self) -> i32 {
        match self {
            Error::InvalidValue { .. } => status::INVALID_VALUE_IN_REQUEST,
            Error::NotReadable(_) => status::WRITE_ONLY_CHARACTERISTIC,
            Error::NotWritable(_) => status::READ_ONLY_CHARACTERISTIC,
            Error::NotNotifiable(_) => status::NOTIFICATION_NOT_SUPPORTED,
            Error::UnknownCharacteristic(_) => status::RESOURCE_DOES_NOT_EXIST,
            Error::RejectedByHandler { .. } => status::RESOURCE_BUSY,
            Error::TransitionFailed { .. } => status::OPERATION_TIMED_OUT,
            Error::InvalidStateTransition { .. } | Error::EngineStopped => {
                status::SERVICE_COMMUNICATION_FAILURE
            }
            Error::PartialNotifyFailure { .. } => status::OUT_OF_RESOURCES,
            Error::Config(_) | Error::MissingConfig(_) | Error::Io(_) => {
                status::SERVICE_COMMUNICATION_FAILURE
            }
        }
    }

    /// Whether the error leaves accessory state untouched and the caller may retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::EngineStopped | Error::Config(_) | Error::MissingConfig(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
