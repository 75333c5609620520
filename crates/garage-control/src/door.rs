//! Door state machine.
//!
//! Tracks the current and target door state and the obstruction flag, and
//! decides which drive commands reconcile the two. The machine is pure: it
//! never talks to hardware. Every operation returns a [`DoorStep`] listing
//! the transitions it performed and the command the caller must send to the
//! door drive.
//!
//! # Valid Transitions
//!
//! - Open → Closing, Closed, Stopped
//! - Closed → Opening, Open, Stopped
//! - Opening → Open, Closed, Stopped
//! - Closing → Closed, Open, Stopped
//! - Stopped → Opening, Closing, Open, Closed
//!
//! Moving directly from Opening to Closing (or back) is not allowed: a
//! reversing write is queued until the current motion settles. While the
//! obstruction flag is set, Open and Closed are unreachable.
//!
//! # Examples
//!
//! ```
//! use garage_control::{DoorCommand, DoorStateMachine};
//! use garage_core::{CurrentDoorState, TargetDoorState};
//! use garage_core::constants::DEFAULT_DOOR_TRAVEL_TIMEOUT_MS;
//! use std::time::Duration;
//!
//! let mut door = DoorStateMachine::new(Duration::from_millis(DEFAULT_DOOR_TRAVEL_TIMEOUT_MS));
//! assert_eq!(door.current(), CurrentDoorState::Stopped);
//!
//! let step = door.set_target(TargetDoorState::Closed).unwrap();
//! assert_eq!(step.command, Some(DoorCommand::Drive(TargetDoorState::Closed)));
//! assert_eq!(door.current(), CurrentDoorState::Closing);
//!
//! door.on_reached(TargetDoorState::Closed).unwrap();
//! assert_eq!(door.current(), CurrentDoorState::Closed);
//! ```

use crate::transition::{History, StateTransition};
use garage_core::{CurrentDoorState, Error, Result, TargetDoorState};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A transition of the current door state.
pub type DoorTransition = StateTransition<CurrentDoorState>;

/// Command for the door drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCommand {
    /// Start moving towards the target.
    Drive(TargetDoorState),
    /// Halt motion.
    Halt,
}

/// Result of one door machine operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoorStep {
    /// Current-state transitions performed, oldest first.
    pub transitions: Vec<DoorTransition>,
    /// Drive command the caller must issue.
    pub command: Option<DoorCommand>,
    /// New obstruction flag, if it changed.
    pub obstruction: Option<bool>,
    /// New target, if the machine changed it itself.
    pub target: Option<TargetDoorState>,
    /// Reason the motion failed, if it did.
    pub failure: Option<String>,
}

impl DoorStep {
    /// Nothing changed and nothing needs to be done.
    pub fn is_noop(&self) -> bool {
        self.transitions.is_empty()
            && self.command.is_none()
            && self.obstruction.is_none()
            && self.target.is_none()
            && self.failure.is_none()
    }
}

fn allowed(from: CurrentDoorState, to: CurrentDoorState) -> bool {
    use CurrentDoorState::*;
    matches!(
        (from, to),
        (Open, Closing | Closed | Stopped)
            | (Closed, Opening | Open | Stopped)
            | (Opening, Open | Closed | Stopped)
            | (Closing, Closed | Open | Stopped)
            | (Stopped, Opening | Closing | Open | Closed)
    )
}

/// State machine for the door sub-state of a garage door opener.
#[derive(Debug)]
pub struct DoorStateMachine {
    current: CurrentDoorState,
    target: TargetDoorState,
    obstructed: bool,
    /// Target written while the door was moving the other way.
    queued: Option<TargetDoorState>,
    state_entered_at: Instant,
    deadline: Option<Instant>,
    travel_timeout: Duration,
    history: History<CurrentDoorState>,
}

impl DoorStateMachine {
    /// New machine: current `stopped`, target `closed`, no obstruction.
    pub fn new(travel_timeout: Duration) -> Self {
        Self::builder().with_travel_timeout(travel_timeout).build()
    }

    pub fn builder() -> DoorStateMachineBuilder {
        DoorStateMachineBuilder::default()
    }

    pub fn current(&self) -> CurrentDoorState {
        self.current
    }

    pub fn target(&self) -> TargetDoorState {
        self.target
    }

    pub fn is_obstructed(&self) -> bool {
        self.obstructed
    }

    /// Target waiting for the current motion to settle.
    pub fn queued_target(&self) -> Option<TargetDoorState> {
        self.queued
    }

    /// When the motion in progress must have completed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    pub fn history(&self) -> &History<CurrentDoorState> {
        &self.history
    }

    /// Whether the current state may move to `to` right now.
    pub fn can_transition_to(&self, to: CurrentDoorState) -> bool {
        if self.obstructed && matches!(to, CurrentDoorState::Open | CurrentDoorState::Closed) {
            return false;
        }
        allowed(self.current, to)
    }

    /// Apply a controller write of the target door state.
    ///
    /// The target is always stored. Motion starts only when the door is at
    /// rest away from the target and no obstruction is present. A write
    /// arriving during motion in the opposite direction is queued; the
    /// newest queued write wins.
    ///
    /// # Errors
    /// `InvalidStateTransition` if the transition table is violated, which
    /// indicates an internal inconsistency.
    pub fn set_target(&mut self, target: TargetDoorState) -> Result<DoorStep> {
        self.target = target;
        let mut step = DoorStep::default();

        if self.obstructed {
            debug!(%target, "Door obstructed, target stored without motion");
            return Ok(step);
        }

        if self.current.is_moving() {
            if target.is_consistent_with(self.current) {
                self.queued = None;
            } else {
                debug!(%target, current = %self.current, "Door moving, target queued");
                self.queued = Some(target);
            }
            return Ok(step);
        }

        if target.is_consistent_with(self.current) {
            return Ok(step);
        }

        self.start_motion(target, &mut step)?;
        Ok(step)
    }

    /// The drive reports that it reached `position`.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_reached(&mut self, position: TargetDoorState) -> Result<DoorStep> {
        let mut step = DoorStep::default();

        if self.current != position.motion_state() {
            debug!(%position, current = %self.current, "Ignoring stale completion");
            return Ok(step);
        }

        self.deadline = None;
        step.transitions.push(self.transition_to(position.resting_state())?);

        if let Some(queued) = self.queued.take()
            && queued != position
        {
            info!(%queued, "Applying queued door target");
            self.start_motion(queued, &mut step)?;
        }
        Ok(step)
    }

    /// The safety sensor changed state.
    ///
    /// Detection halts motion in progress (current becomes `stopped`) and
    /// discards any queued target. Clearing never resumes motion.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_obstruction(&mut self, detected: bool) -> Result<DoorStep> {
        let mut step = DoorStep::default();
        if self.obstructed == detected {
            return Ok(step);
        }

        self.obstructed = detected;
        step.obstruction = Some(detected);

        if detected {
            warn!(current = %self.current, "Obstruction detected");
            self.queued = None;
            if self.current.is_moving() {
                self.deadline = None;
                step.transitions.push(self.transition_to(CurrentDoorState::Stopped)?);
                step.command = Some(DoorCommand::Halt);
            }
        } else {
            info!("Obstruction cleared");
        }
        Ok(step)
    }

    /// The door came to rest at `position` without being commanded.
    ///
    /// The target follows the door so that controllers see a settled state.
    /// Ignored while obstructed.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_moved_externally(&mut self, position: TargetDoorState) -> Result<DoorStep> {
        let mut step = DoorStep::default();
        if self.obstructed {
            warn!(%position, "Ignoring external movement while obstructed");
            return Ok(step);
        }

        self.deadline = None;
        self.queued = None;
        let resting = position.resting_state();
        if self.current != resting {
            info!(%position, "Door moved externally");
            step.transitions.push(self.transition_to(resting)?);
        }
        if self.target != position {
            self.target = position;
            step.target = Some(position);
        }
        Ok(step)
    }

    /// The drive reported a failure. The door is considered stopped and a
    /// target queued during the failed motion is applied from there.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_fault(&mut self, reason: impl Into<String>) -> Result<DoorStep> {
        let reason = reason.into();
        warn!(%reason, current = %self.current, "Door drive fault");
        let mut step = self.force_stop()?;
        step.failure = Some(reason);
        Ok(step)
    }

    /// Whether the motion in progress has exceeded its deadline at `now`.
    pub fn has_timed_out(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Fail the motion in progress if its deadline has passed.
    ///
    /// Returns `None` when no timeout occurred.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn check_and_handle_timeout(&mut self, now: Instant) -> Result<Option<DoorStep>> {
        if !self.has_timed_out(now) {
            return Ok(None);
        }

        let heading = self.current;
        let mut step = self.force_stop()?;
        step.command.get_or_insert(DoorCommand::Halt);
        step.failure = Some(format!(
            "door still {heading} after {}ms",
            self.travel_timeout.as_millis()
        ));
        warn!(%heading, "Door travel timed out");
        Ok(Some(step))
    }

    fn force_stop(&mut self) -> Result<DoorStep> {
        let mut step = DoorStep::default();
        self.deadline = None;
        if self.current != CurrentDoorState::Stopped {
            step.transitions.push(self.transition_to(CurrentDoorState::Stopped)?);
        }
        if let Some(queued) = self.queued.take()
            && !self.obstructed
        {
            info!(%queued, "Applying queued door target after stop");
            self.start_motion(queued, &mut step)?;
        }
        Ok(step)
    }

    fn start_motion(&mut self, target: TargetDoorState, step: &mut DoorStep) -> Result<()> {
        step.transitions.push(self.transition_to(target.motion_state())?);
        self.deadline = Some(Instant::now() + self.travel_timeout);
        step.command = Some(DoorCommand::Drive(target));
        Ok(())
    }

    fn transition_to(&mut self, to: CurrentDoorState) -> Result<DoorTransition> {
        if !self.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }

        let transition = StateTransition::new(self.current, to);
        debug!(from = %self.current, %to, "Door transition");
        self.current = to;
        self.state_entered_at = transition.timestamp;
        self.history.push(transition.clone());
        Ok(transition)
    }
}

/// Builder for restoring a door machine to a known state.
#[derive(Debug)]
pub struct DoorStateMachineBuilder {
    current: CurrentDoorState,
    target: TargetDoorState,
    obstructed: bool,
    travel_timeout: Duration,
}

impl DoorStateMachineBuilder {
    /// Start in `state`. Motion states are not accepted as initial states and
    /// fall back to `stopped`.
    pub fn with_initial_state(mut self, state: CurrentDoorState) -> Self {
        self.current = if state.is_moving() {
            CurrentDoorState::Stopped
        } else {
            state
        };
        self
    }

    pub fn with_target(mut self, target: TargetDoorState) -> Self {
        self.target = target;
        self
    }

    pub fn with_obstruction(mut self, obstructed: bool) -> Self {
        self.obstructed = obstructed;
        self
    }

    pub fn with_travel_timeout(mut self, timeout: Duration) -> Self {
        self.travel_timeout = timeout;
        self
    }

    pub fn build(self) -> DoorStateMachine {
        DoorStateMachine {
            current: self.current,
            target: self.target,
            obstructed: self.obstructed,
            queued: None,
            state_entered_at: Instant::now(),
            deadline: None,
            travel_timeout: self.travel_timeout,
            history: History::new(),
        }
    }
}

impl Default for DoorStateMachineBuilder {
    fn default() -> Self {
        Self {
            current: CurrentDoorState::Stopped,
            target: TargetDoorState::Closed,
            obstructed: false,
            travel_timeout: Duration::from_millis(
                garage_core::constants::DEFAULT_DOOR_TRAVEL_TIMEOUT_MS,
            ),
        }
    }
}
