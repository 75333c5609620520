//! Door and lock reconciliation for the garage door opener accessory.
//!
//! The types in this crate are pure state machines: they consume controller
//! writes and actuator reports and return the transitions they performed
//! together with the command the caller must forward to the hardware.

pub mod door;
pub mod lock;
pub mod transition;

pub use door::{DoorCommand, DoorStateMachine, DoorStateMachineBuilder, DoorStep, DoorTransition};
pub use lock::{LockCommand, LockCoordinator, LockStep, LockTransition};
pub use transition::{History, StateTransition};
