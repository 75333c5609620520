//! Accessory engine.
//!
//! A single task owns the door state machine, the lock coordinator and both
//! actuators. Controller target writes, actuator reports and deadline expiry
//! are all processed one at a time by this task, so every multi-step state
//! change (door transition, lock follow-up, characteristic updates) is
//! serialized per accessory.
//!
//! ```text
//! target write ──hook──> commands ─┐
//! door actuator events ────────────┼──> AccessoryEngine ──update()──> characteristics
//! lock actuator events ────────────┤          │
//! deadlines ───────────────────────┘          └──> events (broadcast)
//! ```

use chrono::{DateTime, Utc};
use garage_control::{
    DoorCommand, DoorStateMachine, DoorStep, DoorTransition, LockCommand, LockCoordinator,
    LockStep,
};
use garage_core::{
    CurrentDoorState, LockCurrentState, LockTargetState, Result, TargetDoorState, Value,
};
use garage_hap::Characteristic;
use garage_hardware::{
    AnyDoorActuator, AnyLockActuator, DoorActuator, DoorEvent, DoorPosition, LockActuator,
    LockEvent,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Work handed to the engine by the characteristic write hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    SetDoorTarget(TargetDoorState),
    SetLockTarget(LockTargetState),
}

/// Something the engine did, with the wall-clock time it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EngineEventKind,
}

impl EngineEvent {
    fn now(kind: EngineEventKind) -> Self {
        Self { at: Utc::now(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEventKind {
    DoorTransition {
        from: CurrentDoorState,
        to: CurrentDoorState,
    },
    LockTransition {
        from: LockCurrentState,
        to: LockCurrentState,
    },
    ObstructionChanged {
        detected: bool,
    },
    TransitionFailed {
        reason: String,
    },
}

/// The characteristics the engine keeps in sync with its state machines.
#[derive(Debug, Clone)]
pub struct EnginePoints {
    pub current_door: Arc<Characteristic>,
    pub target_door: Arc<Characteristic>,
    pub obstruction: Arc<Characteristic>,
    pub lock_current: Arc<Characteristic>,
}

/// Actor reconciling door and lock state with the hardware.
pub struct AccessoryEngine {
    door: DoorStateMachine,
    lock: LockCoordinator,
    door_actuator: AnyDoorActuator,
    lock_actuator: AnyLockActuator,
    door_online: bool,
    lock_online: bool,
    points: EnginePoints,
    commands: mpsc::Receiver<EngineCommand>,
    events: broadcast::Sender<EngineEvent>,
}

impl AccessoryEngine {
    pub fn new(
        door: DoorStateMachine,
        lock: LockCoordinator,
        door_actuator: AnyDoorActuator,
        lock_actuator: AnyLockActuator,
        points: EnginePoints,
        commands: mpsc::Receiver<EngineCommand>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            door,
            lock,
            door_actuator,
            lock_actuator,
            door_online: true,
            lock_online: true,
            points,
            commands,
            events,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process work until every command sender is gone.
    pub async fn run(mut self) {
        match self.door_actuator.get_info().await {
            Ok(info) => info!(name = %info.name, model = %info.model, "Door actuator attached"),
            Err(err) => warn!(error = %err, "Door actuator did not identify itself"),
        }
        match self.lock_actuator.get_info().await {
            Ok(info) => info!(name = %info.name, model = %info.model, "Lock actuator attached"),
            Err(err) => warn!(error = %err, "Lock actuator did not identify itself"),
        }
        info!(
            door = %self.door.current(),
            lock = %self.lock.current(),
            "Accessory engine started"
        );
        self.sync_points();

        loop {
            let deadline = earliest(self.door.deadline(), self.lock.deadline());

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = self.door_actuator.next_event(), if self.door_online => match event {
                    Ok(event) => self.handle_door_event(event).await,
                    Err(err) => {
                        error!(error = %err, "Door actuator lost");
                        self.door_online = false;
                    }
                },
                event = self.lock_actuator.next_event(), if self.lock_online => match event {
                    Ok(event) => self.handle_lock_event(event).await,
                    Err(err) => {
                        error!(error = %err, "Lock actuator lost");
                        self.lock_online = false;
                    }
                },
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => self.handle_deadlines().await,
            }
        }

        info!("Accessory engine stopped");
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        debug!(?command, "Engine command");
        match command {
            EngineCommand::SetDoorTarget(target) => {
                let step = self.door.set_target(target);
                self.apply_door(step).await;
            }
            EngineCommand::SetLockTarget(target) => {
                let step = self.lock.set_target(target);
                self.apply_lock(step).await;
            }
        }
    }

    async fn handle_door_event(&mut self, event: DoorEvent) {
        debug!(?event, "Door event");
        let step = match event {
            DoorEvent::Reached(position) => self.door.on_reached(target_of(position)),
            DoorEvent::ObstructionDetected => self.door.on_obstruction(true),
            DoorEvent::ObstructionCleared => self.door.on_obstruction(false),
            DoorEvent::MovedExternally(position) => {
                self.door.on_moved_externally(target_of(position))
            }
            DoorEvent::Fault(reason) => self.door.on_fault(reason),
        };
        self.apply_door(step).await;
    }

    async fn handle_lock_event(&mut self, event: LockEvent) {
        debug!(?event, "Lock event");
        let step = match event {
            LockEvent::Engaged => self.lock.on_engaged(),
            LockEvent::Released => self.lock.on_released(),
            LockEvent::Jammed(reason) => self.lock.on_jammed(reason),
        };
        self.apply_lock(step).await;
    }

    async fn handle_deadlines(&mut self) {
        let now = Instant::now();
        match self.door.check_and_handle_timeout(now) {
            Ok(Some(step)) => self.apply_door(Ok(step)).await,
            Ok(None) => {}
            Err(err) => error!(error = %err, "Door timeout handling failed"),
        }
        match self.lock.check_and_handle_timeout(now) {
            Ok(Some(step)) => self.apply_lock(Ok(step)).await,
            Ok(None) => {}
            Err(err) => error!(error = %err, "Lock timeout handling failed"),
        }
    }

    /// Reflect a door step in the characteristics, let the lock follow each
    /// transition and forward the drive command. A drive that refuses the
    /// command is treated as a fault.
    async fn apply_door(&mut self, step: Result<DoorStep>) {
        let mut step = match step {
            Ok(step) => step,
            Err(err) => {
                error!(error = %err, "Door state machine rejected operation");
                return;
            }
        };

        loop {
            if let Some(detected) = step.obstruction {
                self.set_point(&self.points.obstruction, detected);
                self.publish(EngineEventKind::ObstructionChanged { detected });
            }
            if let Some(target) = step.target {
                self.set_point(&self.points.target_door, target);
            }
            for transition in &step.transitions {
                let lock_step = self.lock.on_door_transition(transition.from, transition.to);
                // A secured lock must read unsecured before the door stops
                // reading closed.
                if transition.from == CurrentDoorState::Closed {
                    self.apply_lock(lock_step).await;
                    self.commit_door(transition);
                } else {
                    self.commit_door(transition);
                    self.apply_lock(lock_step).await;
                }
            }
            if let Some(reason) = step.failure.take() {
                self.publish(EngineEventKind::TransitionFailed { reason });
            }

            let Some(command) = step.command else {
                return;
            };
            let Err(err) = self.drive_door(command).await else {
                return;
            };
            warn!(?command, error = %err, "Door drive refused command");
            step = match self.door.on_fault(err.to_string()) {
                Ok(step) => step,
                Err(err) => {
                    error!(error = %err, "Door state machine rejected fault");
                    return;
                }
            };
        }
    }

    fn commit_door(&self, transition: &DoorTransition) {
        self.set_point(&self.points.current_door, transition.to);
        self.publish(EngineEventKind::DoorTransition {
            from: transition.from,
            to: transition.to,
        });
    }

    async fn apply_lock(&mut self, step: Result<LockStep>) {
        let mut step = match step {
            Ok(step) => step,
            Err(err) => {
                error!(error = %err, "Lock coordinator rejected operation");
                return;
            }
        };

        loop {
            for transition in &step.transitions {
                self.set_point(&self.points.lock_current, transition.to);
                self.publish(EngineEventKind::LockTransition {
                    from: transition.from,
                    to: transition.to,
                });
            }
            if let Some(reason) = step.failure.take() {
                self.publish(EngineEventKind::TransitionFailed { reason });
            }

            let Some(command) = step.command else {
                return;
            };
            let result = match command {
                LockCommand::Engage => self.lock_actuator.engage().await,
                LockCommand::Release => self.lock_actuator.release().await,
            };
            let Err(err) = result else {
                return;
            };
            warn!(?command, error = %err, "Lock actuator refused command");
            step = match self.lock.on_jammed(err.to_string()) {
                Ok(step) => step,
                Err(err) => {
                    error!(error = %err, "Lock coordinator rejected jam");
                    return;
                }
            };
        }
    }

    async fn drive_door(&mut self, command: DoorCommand) -> garage_hardware::Result<()> {
        match command {
            DoorCommand::Drive(target) => self.door_actuator.start_motion(position_of(target)).await,
            DoorCommand::Halt => self.door_actuator.stop().await,
        }
    }

    /// Bring the characteristics in line with the machines' initial state.
    fn sync_points(&self) {
        self.set_point(&self.points.current_door, self.door.current());
        self.set_point(&self.points.target_door, self.door.target());
        self.set_point(&self.points.obstruction, self.door.is_obstructed());
        self.set_point(&self.points.lock_current, self.lock.current());
    }

    fn set_point(&self, characteristic: &Characteristic, value: impl Into<Value>) {
        if let Err(err) = characteristic.update(value) {
            error!(id = %characteristic.id(), error = %err, "Characteristic update failed");
        }
    }

    fn publish(&self, kind: EngineEventKind) {
        // No receivers is fine.
        let _ = self.events.send(EngineEvent::now(kind));
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn position_of(target: TargetDoorState) -> DoorPosition {
    match target {
        TargetDoorState::Open => DoorPosition::Open,
        TargetDoorState::Closed => DoorPosition::Closed,
    }
}

fn target_of(position: DoorPosition) -> TargetDoorState {
    match position {
        DoorPosition::Open => TargetDoorState::Open,
        DoorPosition::Closed => TargetDoorState::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_earliest_deadline() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest(Some(later), Some(now)), Some(now));
        assert_eq!(earliest(None, Some(later)), Some(later));
        assert_eq!(earliest(None, None), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::now(EngineEventKind::DoorTransition {
            from: CurrentDoorState::Closing,
            to: CurrentDoorState::Closed,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "door_transition");
        assert_eq!(json["to"], "closed");
        assert!(json["at"].is_string());
    }

    #[test]
    fn test_position_mapping_round_trips() {
        for target in [TargetDoorState::Open, TargetDoorState::Closed] {
            assert_eq!(target_of(position_of(target)), target);
        }
    }
}
