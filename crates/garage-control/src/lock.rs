//! Lock state coordinator.
//!
//! Keeps the lock sub-state consistent with the door: the bolt is only
//! thrown while the door is closed, a secure request made while the door is
//! elsewhere waits for the door to close, and a door leaving `closed`
//! releases the bolt. `jammed` is entered only when the lock reports a jam
//! or fails to finish an actuation in time.

use crate::transition::{History, StateTransition};
use garage_core::{CurrentDoorState, Error, LockCurrentState, LockTargetState, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub type LockTransition = StateTransition<LockCurrentState>;

/// Command for the lock bolt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    Engage,
    Release,
}

/// Result of one coordinator operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockStep {
    pub transitions: Vec<LockTransition>,
    pub command: Option<LockCommand>,
    pub failure: Option<String>,
}

impl LockStep {
    pub fn is_noop(&self) -> bool {
        self.transitions.is_empty() && self.command.is_none() && self.failure.is_none()
    }
}

fn allowed(from: LockCurrentState, to: LockCurrentState) -> bool {
    use LockCurrentState::*;
    matches!(
        (from, to),
        (Unknown, Unsecured | Secured | Jammed)
            | (Unsecured, Secured | Jammed)
            | (Secured, Unsecured | Jammed)
            | (Jammed, Unsecured | Secured)
    )
}

/// Coordinator for the lock sub-state.
#[derive(Debug)]
pub struct LockCoordinator {
    current: LockCurrentState,
    target: LockTargetState,
    /// Whether a target was written since startup.
    engaged_by_controller: bool,
    door_closed: bool,
    /// Actuation in flight and its deadline.
    actuating: Option<(LockCommand, Instant)>,
    actuation_timeout: Duration,
    history: History<LockCurrentState>,
}

impl LockCoordinator {
    /// New coordinator: current `unknown`, target `unsecured`, door not closed.
    pub fn new(actuation_timeout: Duration) -> Self {
        Self {
            current: LockCurrentState::Unknown,
            target: LockTargetState::Unsecured,
            engaged_by_controller: false,
            door_closed: false,
            actuating: None,
            actuation_timeout,
            history: History::new(),
        }
    }

    /// Seed the door position known at startup.
    #[must_use]
    pub fn with_door_state(mut self, door: CurrentDoorState) -> Self {
        self.door_closed = door == CurrentDoorState::Closed;
        self
    }

    pub fn current(&self) -> LockCurrentState {
        self.current
    }

    pub fn target(&self) -> LockTargetState {
        self.target
    }

    pub fn is_actuating(&self) -> bool {
        self.actuating.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.actuating.map(|(_, deadline)| deadline)
    }

    pub fn history(&self) -> &History<LockCurrentState> {
        &self.history
    }

    pub fn can_transition_to(&self, to: LockCurrentState) -> bool {
        if to == LockCurrentState::Secured && !self.door_closed {
            return false;
        }
        allowed(self.current, to)
    }

    /// Apply a controller write of the lock target state.
    ///
    /// Securing while the door is not closed is accepted and completes once
    /// the door closes. A write during an actuation is applied when the
    /// actuation finishes. A write also retries a jammed lock.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn set_target(&mut self, target: LockTargetState) -> Result<LockStep> {
        self.target = target;
        self.engaged_by_controller = true;
        let mut step = LockStep::default();

        if target == LockTargetState::Secured && !self.door_closed {
            info!("Lock secure requested, waiting for door to close");
        }
        self.reconcile(true, &mut step)?;
        Ok(step)
    }

    /// Track a door transition.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_door_transition(
        &mut self,
        from: CurrentDoorState,
        to: CurrentDoorState,
    ) -> Result<LockStep> {
        let mut step = LockStep::default();
        self.door_closed = to == CurrentDoorState::Closed;

        if from == CurrentDoorState::Closed && !self.door_closed {
            let engaging = matches!(self.actuating, Some((LockCommand::Engage, _)));
            if self.current == LockCurrentState::Secured || engaging {
                warn!(door = %to, "Door left closed while secured, releasing lock");
                if self.current == LockCurrentState::Secured {
                    step.transitions
                        .push(self.transition_to(LockCurrentState::Unsecured)?);
                }
                self.begin(LockCommand::Release, &mut step);
            }
            return Ok(step);
        }

        if self.door_closed {
            self.reconcile(false, &mut step)?;
        }
        Ok(step)
    }

    /// The bolt reports it is thrown.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_engaged(&mut self) -> Result<LockStep> {
        let mut step = LockStep::default();
        self.actuating = None;

        if !self.door_closed {
            warn!("Bolt engaged while door not closed, releasing");
            self.begin(LockCommand::Release, &mut step);
            return Ok(step);
        }

        if self.current != LockCurrentState::Secured {
            step.transitions.push(self.transition_to(LockCurrentState::Secured)?);
        }
        self.reconcile(false, &mut step)?;
        Ok(step)
    }

    /// The bolt reports it is retracted.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_released(&mut self) -> Result<LockStep> {
        let mut step = LockStep::default();
        self.actuating = None;

        if self.current != LockCurrentState::Unsecured {
            step.transitions
                .push(self.transition_to(LockCurrentState::Unsecured)?);
        }
        self.reconcile(false, &mut step)?;
        Ok(step)
    }

    /// The bolt reports a jam.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn on_jammed(&mut self, reason: impl Into<String>) -> Result<LockStep> {
        let reason = reason.into();
        warn!(%reason, "Lock jammed");
        self.jam(reason)
    }

    pub fn has_timed_out(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Declare the lock jammed if the actuation in flight overran.
    ///
    /// # Errors
    /// `InvalidStateTransition` on an internal inconsistency.
    pub fn check_and_handle_timeout(&mut self, now: Instant) -> Result<Option<LockStep>> {
        if !self.has_timed_out(now) {
            return Ok(None);
        }
        let Some((command, _)) = self.actuating else {
            return Ok(None);
        };

        let action = match command {
            LockCommand::Engage => "engage",
            LockCommand::Release => "release",
        };
        warn!(action, "Lock actuation timed out");
        self.jam(format!(
            "lock did not {action} within {}ms",
            self.actuation_timeout.as_millis()
        ))
        .map(Some)
    }

    fn jam(&mut self, reason: String) -> Result<LockStep> {
        let mut step = LockStep::default();
        self.actuating = None;
        if self.current != LockCurrentState::Jammed {
            step.transitions.push(self.transition_to(LockCurrentState::Jammed)?);
        }
        step.failure = Some(reason);
        Ok(step)
    }

    /// Issue the command that moves the bolt towards the target, if any.
    fn reconcile(&mut self, explicit: bool, step: &mut LockStep) -> Result<()> {
        if self.actuating.is_some() || !self.engaged_by_controller {
            return Ok(());
        }
        if self.current == LockCurrentState::Jammed && !explicit {
            return Ok(());
        }

        match self.target {
            LockTargetState::Secured => {
                if self.door_closed && self.current != LockCurrentState::Secured {
                    self.begin(LockCommand::Engage, step);
                }
            }
            LockTargetState::Unsecured => {
                if self.current != LockCurrentState::Unsecured {
                    self.begin(LockCommand::Release, step);
                }
            }
        }
        Ok(())
    }

    fn begin(&mut self, command: LockCommand, step: &mut LockStep) {
        debug!(?command, "Lock actuation started");
        self.actuating = Some((command, Instant::now() + self.actuation_timeout));
        step.command = Some(command);
    }

    fn transition_to(&mut self, to: LockCurrentState) -> Result<LockTransition> {
        if !self.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }
        let transition = StateTransition::new(self.current, to);
        debug!(from = %self.current, %to, "Lock transition");
        self.current = to;
        self.history.push(transition.clone());
        Ok(transition)
    }
}
