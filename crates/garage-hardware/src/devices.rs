//! Enum wrappers for actuator dispatch.
//!
//! Native `async fn` in traits are not object-safe, so the engine holds one
//! of these enums instead of `Box<dyn DoorActuator>`. Each variant wraps a
//! concrete implementation and the futures stay `Send` because their
//! concrete types are known.
//!
//! # Examples
//!
//! ```
//! use garage_hardware::devices::AnyDoorActuator;
//! use garage_hardware::mock::MockDoor;
//!
//! let (door, _handle) = MockDoor::new();
//! let any_door = AnyDoorActuator::Mock(door);
//! ```

use crate::mock::{MockDoor, MockIndicator, MockLock};
use crate::traits::{DoorActuator, DoorEvent, IdentifyIndicator, LockActuator, LockEvent};
use crate::{DeviceInfo, DoorPosition, Result};

/// Enum wrapper for door drive dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyDoorActuator {
    /// Mock door for development and testing.
    Mock(MockDoor),
}

impl DoorActuator for AnyDoorActuator {
    async fn start_motion(&mut self, target: DoorPosition) -> Result<()> {
        match self {
            Self::Mock(device) => device.start_motion(target).await,
        }
    }

    async fn stop(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.stop().await,
        }
    }

    async fn next_event(&mut self) -> Result<DoorEvent> {
        match self {
            Self::Mock(device) => device.next_event().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
        }
    }
}

impl From<MockDoor> for AnyDoorActuator {
    fn from(device: MockDoor) -> Self {
        Self::Mock(device)
    }
}

/// Enum wrapper for lock bolt dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLockActuator {
    /// Mock lock for development and testing.
    Mock(MockLock),
}

impl LockActuator for AnyLockActuator {
    async fn engage(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.engage().await,
        }
    }

    async fn release(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.release().await,
        }
    }

    async fn next_event(&mut self) -> Result<LockEvent> {
        match self {
            Self::Mock(device) => device.next_event().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
        }
    }
}

impl From<MockLock> for AnyLockActuator {
    fn from(device: MockLock) -> Self {
        Self::Mock(device)
    }
}

/// Enum wrapper for identify indicator dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyIndicator {
    /// Mock indicator for development and testing.
    Mock(MockIndicator),
}

impl IdentifyIndicator for AnyIndicator {
    async fn identify(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.identify().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
        }
    }
}

impl From<MockIndicator> for AnyIndicator {
    fn from(device: MockIndicator) -> Self {
        Self::Mock(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_door_dispatch() {
        let (door, handle) = MockDoor::new();
        let mut door = AnyDoorActuator::from(door);

        door.start_motion(DoorPosition::Open).await.unwrap();
        handle.complete().await.unwrap();
        assert_eq!(
            door.next_event().await.unwrap(),
            DoorEvent::Reached(DoorPosition::Open)
        );
        assert_eq!(door.get_info().await.unwrap().name, "Mock Door");
    }

    #[tokio::test]
    async fn test_any_lock_dispatch() {
        let (lock, handle) = MockLock::new();
        let mut lock = AnyLockActuator::from(lock);

        lock.release().await.unwrap();
        handle.complete().await.unwrap();
        assert_eq!(lock.next_event().await.unwrap(), LockEvent::Released);
    }

    #[tokio::test]
    async fn test_any_indicator_dispatch() {
        let (indicator, handle) = MockIndicator::new();
        let mut indicator = AnyIndicator::from(indicator);
        indicator.identify().await.unwrap();
        assert_eq!(handle.blink_count(), 1);
    }
}
