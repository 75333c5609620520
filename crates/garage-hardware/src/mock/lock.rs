//! Mock lock bolt for testing and development.

use super::{ActuationMode, lock_sim};
use crate::{
    HardwareError, Result,
    traits::{LockActuator, LockEvent},
    types::{ActuatorCommand, DeviceInfo},
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct LockSim {
    pending: Option<LockEvent>,
    jam_next: Option<String>,
    engaged: bool,
    commands: Vec<ActuatorCommand>,
    actuation: Option<JoinHandle<()>>,
    /// Only strong sender of the event channel. `None` once unplugged.
    link: Option<mpsc::Sender<LockEvent>>,
}

impl LockSim {
    fn cancel(&mut self) {
        if let Some(actuation) = self.actuation.take() {
            actuation.abort();
        }
        self.pending = None;
    }

    fn link(&self) -> Result<mpsc::Sender<LockEvent>> {
        self.link
            .clone()
            .ok_or_else(|| HardwareError::disconnected("Lock unplugged"))
    }

    fn settle(&mut self, event: &LockEvent) {
        match event {
            LockEvent::Engaged => self.engaged = true,
            LockEvent::Released => self.engaged = false,
            LockEvent::Jammed(_) => {}
        }
    }
}

/// Mock lock bolt.
///
/// In [`ActuationMode::Manual`] the bolt only finishes moving when the
/// handle calls [`MockLockHandle::complete`]; a bolt that is never completed
/// models an unresponsive actuator.
#[derive(Debug)]
pub struct MockLock {
    event_rx: mpsc::Receiver<LockEvent>,
    event_tx: mpsc::WeakSender<LockEvent>,
    sim: Arc<Mutex<LockSim>>,
    mode: ActuationMode,
    name: String,
}

impl MockLock {
    pub fn new() -> (Self, MockLockHandle) {
        Self::with_mode("Mock Lock".to_string(), ActuationMode::Manual)
    }

    /// Create a mock lock whose bolt finishes moving after `actuation`.
    pub fn with_actuation(actuation: std::time::Duration) -> (Self, MockLockHandle) {
        Self::with_mode("Mock Lock".to_string(), ActuationMode::Timed(actuation))
    }

    pub fn with_mode(name: String, mode: ActuationMode) -> (Self, MockLockHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let sim = Arc::new(Mutex::new(LockSim {
            link: Some(event_tx.clone()),
            ..LockSim::default()
        }));

        let lock = Self {
            event_rx,
            event_tx: event_tx.downgrade(),
            sim: sim.clone(),
            mode,
            name,
        };
        let handle = MockLockHandle { sim };

        (lock, handle)
    }

    fn actuate(&mut self, command: ActuatorCommand, outcome: LockEvent) -> Result<()> {
        let mut sim = lock_sim(&self.sim);
        sim.commands.push(command);
        sim.cancel();
        sim.link()?;

        let jam = sim.jam_next.take();
        let outcome = match (outcome, jam) {
            (LockEvent::Engaged, Some(message)) => LockEvent::Jammed(message),
            (outcome, jam) => {
                sim.jam_next = jam;
                outcome
            }
        };
        debug!(?command, "Mock lock actuating");

        match self.mode {
            ActuationMode::Manual => sim.pending = Some(outcome),
            ActuationMode::Timed(delay) => {
                let shared = self.sim.clone();
                let event_tx = self.event_tx.clone();
                sim.actuation = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    {
                        let mut sim = lock_sim(&shared);
                        sim.actuation = None;
                        sim.settle(&outcome);
                    }
                    if let Some(event_tx) = event_tx.upgrade() {
                        let _ = event_tx.send(outcome).await;
                    }
                }));
            }
        }
        Ok(())
    }
}

impl Default for MockLock {
    fn default() -> Self {
        Self::new().0
    }
}

impl LockActuator for MockLock {
    async fn engage(&mut self) -> Result<()> {
        self.actuate(ActuatorCommand::Engage, LockEvent::Engaged)
    }

    async fn release(&mut self) -> Result<()> {
        self.actuate(ActuatorCommand::Release, LockEvent::Released)
    }

    async fn next_event(&mut self) -> Result<LockEvent> {
        self.event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Lock event channel closed"))
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Lock v1.0").with_firmware_version("1.0.0"))
    }
}

/// Handle for controlling a mock lock. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockLockHandle {
    sim: Arc<Mutex<LockSim>>,
}

impl MockLockHandle {
    /// Finish the pending actuation. Returns `false` if the bolt was idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock has been dropped.
    pub async fn complete(&self) -> Result<bool> {
        let (pending, link) = {
            let mut sim = lock_sim(&self.sim);
            let pending = sim.pending.take();
            if let Some(event) = &pending {
                sim.settle(event);
            }
            (pending, sim.link())
        };
        match pending {
            Some(event) => {
                link?
                    .send(event)
                    .await
                    .map_err(|_| HardwareError::disconnected("Lock event channel closed"))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Make the next engage attempt jam instead of succeeding.
    pub fn jam_next_engage(&self, message: impl Into<String>) {
        lock_sim(&self.sim).jam_next = Some(message.into());
    }

    /// Report a jam immediately, cancelling any pending actuation.
    pub async fn jam(&self, message: impl Into<String>) -> Result<()> {
        let link = {
            let mut sim = lock_sim(&self.sim);
            sim.cancel();
            sim.link()?
        };
        link.send(LockEvent::Jammed(message.into()))
            .await
            .map_err(|_| HardwareError::disconnected("Lock event channel closed"))
    }

    /// Unplug the bolt actuator. Pending actuation is cancelled, further
    /// commands fail and the event stream ends once queued events are read.
    pub fn disconnect(&self) {
        let mut sim = lock_sim(&self.sim);
        sim.cancel();
        sim.link = None;
    }

    /// Whether an actuation is waiting for [`complete`](Self::complete).
    pub fn is_pending(&self) -> bool {
        lock_sim(&self.sim).pending.is_some()
    }

    /// Whether the bolt is physically thrown.
    pub fn is_engaged(&self) -> bool {
        lock_sim(&self.sim).engaged
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        lock_sim(&self.sim).commands.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_manual_engage() {
        let (mut lock, handle) = MockLock::new();

        lock.engage().await.unwrap();
        assert!(handle.is_pending());
        assert!(!handle.is_engaged());

        assert!(handle.complete().await.unwrap());
        assert_eq!(lock.next_event().await.unwrap(), LockEvent::Engaged);
        assert!(handle.is_engaged());
    }

    #[tokio::test]
    async fn test_disconnect_ends_event_stream() {
        let (mut lock, handle) = MockLock::new();
        lock.engage().await.unwrap();
        handle.disconnect();

        assert!(!handle.is_pending());
        assert!(matches!(
            lock.next_event().await,
            Err(HardwareError::Disconnected { .. })
        ));
        assert!(lock.release().await.is_err());
        assert!(handle.jam("bolt stuck").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_release() {
        let (mut lock, handle) = MockLock::with_actuation(Duration::from_millis(500));

        lock.engage().await.unwrap();
        assert_eq!(lock.next_event().await.unwrap(), LockEvent::Engaged);
        lock.release().await.unwrap();
        assert_eq!(lock.next_event().await.unwrap(), LockEvent::Released);

        assert!(!handle.is_engaged());
        assert_eq!(
            handle.commands(),
            vec![ActuatorCommand::Engage, ActuatorCommand::Release]
        );
    }

    #[tokio::test]
    async fn test_jam_next_engage() {
        let (mut lock, handle) = MockLock::new();
        handle.jam_next_engage("bolt misaligned");

        lock.engage().await.unwrap();
        handle.complete().await.unwrap();

        assert_eq!(
            lock.next_event().await.unwrap(),
            LockEvent::Jammed("bolt misaligned".to_string())
        );
        assert!(!handle.is_engaged());
    }

    #[tokio::test]
    async fn test_release_keeps_jam_armed() {
        let (mut lock, handle) = MockLock::new();
        handle.jam_next_engage("stuck");

        lock.release().await.unwrap();
        handle.complete().await.unwrap();
        assert_eq!(lock.next_event().await.unwrap(), LockEvent::Released);

        lock.engage().await.unwrap();
        handle.complete().await.unwrap();
        assert!(matches!(lock.next_event().await.unwrap(), LockEvent::Jammed(_)));
    }

    #[tokio::test]
    async fn test_jam_now() {
        let (mut lock, handle) = MockLock::new();
        lock.engage().await.unwrap();
        handle.jam("motor stalled").await.unwrap();

        assert!(!handle.is_pending());
        assert!(matches!(lock.next_event().await.unwrap(), LockEvent::Jammed(_)));
    }
}
