//! Actuator abstraction layer for the garage door opener.
//!
//! This crate provides trait-based abstractions for the physical parts of a
//! garage door opener: the door drive, the lock bolt and an identify
//! indicator. Mock implementations with control handles allow the accessory
//! engine to run and be tested without hardware.
//!
//! # Design Philosophy
//!
//! - **Async-first**: all I/O uses native `async fn` in traits.
//! - **Event-driven**: commands return once accepted; completion, sensor
//!   trips and faults arrive through cancel-safe `next_event` calls.
//! - **Thread-safe**: all traits require `Send + Sync` for use with Tokio.
//!
//! # Example
//!
//! ```no_run
//! use garage_hardware::traits::{LockActuator, LockEvent};
//! use garage_hardware::Result;
//!
//! async fn secure<L: LockActuator>(lock: &mut L) -> Result<bool> {
//!     lock.engage().await?;
//!     Ok(matches!(lock.next_event().await?, LockEvent::Engaged))
//! }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyDoorActuator, AnyIndicator, AnyLockActuator};
pub use error::{HardwareError, Result};
pub use traits::{DoorActuator, DoorEvent, IdentifyIndicator, LockActuator, LockEvent};
pub use types::{ActuatorCommand, DeviceInfo, DoorPosition};
