//! Actuator trait definitions.
//!
//! These traits are the contract between the accessory engine and the
//! physical garage hardware: the door drive, the lock bolt and an identify
//! indicator. Mock and real implementations are interchangeable behind them.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{DeviceInfo, DoorPosition};

/// Progress and sensor reports from a door drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoorEvent {
    /// The commanded motion completed at this end position.
    Reached(DoorPosition),

    /// The safety sensor tripped. The drive has halted.
    ObstructionDetected,

    /// The safety sensor is clear again. Motion does not resume by itself.
    ObstructionCleared,

    /// The door came to rest at a position without being commanded
    /// (manual operation, wall button).
    MovedExternally(DoorPosition),

    /// The drive reported a failure and halted.
    Fault(String),
}

/// Progress reports from a lock bolt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// The bolt is thrown.
    Engaged,

    /// The bolt is retracted.
    Released,

    /// The bolt could not complete its travel.
    Jammed(String),
}

/// Door drive.
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use [`AnyDoorActuator`](crate::devices::AnyDoorActuator)
/// for runtime selection.
///
/// # Examples
///
/// ```no_run
/// use garage_hardware::traits::{DoorActuator, DoorEvent};
/// use garage_hardware::types::DoorPosition;
/// use garage_hardware::Result;
///
/// async fn close<D: DoorActuator>(door: &mut D) -> Result<bool> {
///     door.start_motion(DoorPosition::Closed).await?;
///     loop {
///         match door.next_event().await? {
///             DoorEvent::Reached(DoorPosition::Closed) => return Ok(true),
///             DoorEvent::ObstructionDetected | DoorEvent::Fault(_) => return Ok(false),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait DoorActuator: Send + Sync {
    /// Start driving the door towards `target`. Returns once the drive has
    /// accepted the command; completion is reported through
    /// [`next_event`](Self::next_event).
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Obstructed`](crate::HardwareError::Obstructed)
    /// if the safety sensor is tripped, or a communication error.
    async fn start_motion(&mut self, target: DoorPosition) -> Result<()>;

    /// Halt any motion in progress.
    async fn stop(&mut self) -> Result<()>;

    /// Wait for the next report from the drive.
    ///
    /// Must be cancel-safe: dropping the future before it completes loses
    /// no event.
    async fn next_event(&mut self) -> Result<DoorEvent>;

    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Lock bolt of the garage door.
pub trait LockActuator: Send + Sync {
    /// Throw the bolt. Completion arrives as [`LockEvent::Engaged`].
    async fn engage(&mut self) -> Result<()>;

    /// Retract the bolt. Completion arrives as [`LockEvent::Released`].
    async fn release(&mut self) -> Result<()>;

    /// Wait for the next report from the bolt. Must be cancel-safe.
    async fn next_event(&mut self) -> Result<LockEvent>;

    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Visual or audible indicator used to identify the accessory.
pub trait IdentifyIndicator: Send + Sync {
    /// Run one identification routine (blink, beep).
    async fn identify(&mut self) -> Result<()>;

    async fn get_info(&self) -> Result<DeviceInfo>;
}
