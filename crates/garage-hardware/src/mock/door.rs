//! Mock door drive for testing and development.
//!
//! The simulated drive either completes motion by itself after a fixed
//! travel time ([`ActuationMode::Timed`]) or waits for the control handle
//! to complete it ([`ActuationMode::Manual`]). Obstructions, faults and
//! manual door movement are injected through [`MockDoorHandle`].

use super::{ActuationMode, lock_sim};
use crate::{
    HardwareError, Result,
    traits::{DoorActuator, DoorEvent},
    types::{ActuatorCommand, DeviceInfo, DoorPosition},
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct DoorSim {
    moving: Option<DoorPosition>,
    obstructed: bool,
    commands: Vec<ActuatorCommand>,
    travel: Option<JoinHandle<()>>,
    /// Only strong sender of the event channel. `None` once unplugged.
    link: Option<mpsc::Sender<DoorEvent>>,
}

impl DoorSim {
    fn halt(&mut self) -> Option<DoorPosition> {
        if let Some(travel) = self.travel.take() {
            travel.abort();
        }
        self.moving.take()
    }
}

/// Mock door drive.
///
/// # Examples
///
/// ```
/// use garage_hardware::mock::MockDoor;
/// use garage_hardware::traits::{DoorActuator, DoorEvent};
/// use garage_hardware::types::DoorPosition;
///
/// #[tokio::main]
/// async fn main() -> garage_hardware::Result<()> {
///     let (mut door, handle) = MockDoor::new();
///
///     door.start_motion(DoorPosition::Closed).await?;
///     handle.complete().await?;
///
///     assert_eq!(door.next_event().await?, DoorEvent::Reached(DoorPosition::Closed));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDoor {
    event_rx: mpsc::Receiver<DoorEvent>,
    event_tx: mpsc::WeakSender<DoorEvent>,
    sim: Arc<Mutex<DoorSim>>,
    mode: ActuationMode,
    name: String,
}

impl MockDoor {
    /// Create a manually driven mock door.
    pub fn new() -> (Self, MockDoorHandle) {
        Self::with_mode("Mock Door".to_string(), ActuationMode::Manual)
    }

    /// Create a mock door that reaches its target after `travel`.
    pub fn with_travel(travel: std::time::Duration) -> (Self, MockDoorHandle) {
        Self::with_mode("Mock Door".to_string(), ActuationMode::Timed(travel))
    }

    pub fn with_mode(name: String, mode: ActuationMode) -> (Self, MockDoorHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let sim = Arc::new(Mutex::new(DoorSim {
            link: Some(event_tx.clone()),
            ..DoorSim::default()
        }));

        let door = Self {
            event_rx,
            event_tx: event_tx.downgrade(),
            sim: sim.clone(),
            mode,
            name,
        };
        let handle = MockDoorHandle { sim };

        (door, handle)
    }
}

impl Default for MockDoor {
    fn default() -> Self {
        Self::new().0
    }
}

impl DoorActuator for MockDoor {
    async fn start_motion(&mut self, target: DoorPosition) -> Result<()> {
        let mut sim = lock_sim(&self.sim);
        sim.commands.push(ActuatorCommand::Move(target));
        if sim.link.is_none() {
            return Err(HardwareError::disconnected(self.name.clone()));
        }
        if sim.obstructed {
            return Err(HardwareError::Obstructed);
        }
        sim.halt();
        sim.moving = Some(target);
        debug!(%target, "Mock door moving");

        if let ActuationMode::Timed(travel) = self.mode {
            let shared = self.sim.clone();
            let event_tx = self.event_tx.clone();
            sim.travel = Some(tokio::spawn(async move {
                tokio::time::sleep(travel).await;
                let reached = {
                    let mut sim = lock_sim(&shared);
                    if sim.moving == Some(target) {
                        sim.moving = None;
                        sim.travel = None;
                        true
                    } else {
                        false
                    }
                };
                if reached && let Some(event_tx) = event_tx.upgrade() {
                    let _ = event_tx.send(DoorEvent::Reached(target)).await;
                }
            }));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let mut sim = lock_sim(&self.sim);
        sim.commands.push(ActuatorCommand::Stop);
        sim.halt();
        Ok(())
    }

    async fn next_event(&mut self) -> Result<DoorEvent> {
        self.event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Door event channel closed"))
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Door Opener v1.0").with_firmware_version("1.0.0"))
    }
}

/// Handle for controlling a mock door. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockDoorHandle {
    sim: Arc<Mutex<DoorSim>>,
}

impl MockDoorHandle {
    async fn send(&self, event: DoorEvent) -> Result<()> {
        let link = lock_sim(&self.sim)
            .link
            .clone()
            .ok_or_else(|| HardwareError::disconnected("Door unplugged"))?;
        link.send(event)
            .await
            .map_err(|_| HardwareError::disconnected("Door event channel closed"))
    }

    /// Unplug the drive. Motion in progress halts, further commands fail and
    /// the drive's event stream ends once already queued events are read.
    pub fn disconnect(&self) {
        let mut sim = lock_sim(&self.sim);
        sim.halt();
        sim.link = None;
    }

    /// Finish the motion in progress. Returns `false` if the door was idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the door has been dropped.
    pub async fn complete(&self) -> Result<bool> {
        let target = lock_sim(&self.sim).halt();
        match target {
            Some(position) => {
                self.send(DoorEvent::Reached(position)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Trip the safety sensor. Motion in progress halts.
    pub async fn obstruct(&self) -> Result<()> {
        {
            let mut sim = lock_sim(&self.sim);
            sim.obstructed = true;
            sim.halt();
        }
        self.send(DoorEvent::ObstructionDetected).await
    }

    /// Clear the safety sensor.
    pub async fn clear_obstruction(&self) -> Result<()> {
        lock_sim(&self.sim).obstructed = false;
        self.send(DoorEvent::ObstructionCleared).await
    }

    /// Simulate the door being moved by hand to `position`.
    pub async fn move_externally(&self, position: DoorPosition) -> Result<()> {
        lock_sim(&self.sim).halt();
        self.send(DoorEvent::MovedExternally(position)).await
    }

    /// Simulate a drive failure. Motion in progress halts.
    pub async fn fault(&self, message: impl Into<String>) -> Result<()> {
        lock_sim(&self.sim).halt();
        self.send(DoorEvent::Fault(message.into())).await
    }

    /// Target of the motion in progress.
    pub fn moving_towards(&self) -> Option<DoorPosition> {
        lock_sim(&self.sim).moving
    }

    pub fn is_obstructed(&self) -> bool {
        lock_sim(&self.sim).obstructed
    }

    /// Commands received by the drive, oldest first.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        lock_sim(&self.sim).commands.clone()
    }
}
