//! Mock device implementations for testing and development.
//!
//! This module provides simulated actuators that can be controlled
//! programmatically without requiring physical hardware.

pub mod door;
pub mod indicator;
pub mod lock;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// Re-export commonly used types
pub use door::{MockDoor, MockDoorHandle};
pub use indicator::{MockIndicator, MockIndicatorHandle};
pub use lock::{MockLock, MockLockHandle};

/// How a mock actuator completes a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationMode {
    /// Completion is triggered through the control handle.
    Manual,
    /// Completion is reported by itself after the given delay.
    Timed(Duration),
}

fn lock_sim<T>(sim: &Mutex<T>) -> MutexGuard<'_, T> {
    sim.lock().unwrap_or_else(PoisonError::into_inner)
}
