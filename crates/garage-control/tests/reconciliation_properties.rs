//! Property tests driving the door machine and lock coordinator together
//! with arbitrary controller writes and actuator reports.

use garage_control::{DoorStateMachine, DoorStep, LockCoordinator};
use garage_core::{CurrentDoorState, LockCurrentState, LockTargetState, TargetDoorState};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Input {
    DoorTarget(TargetDoorState),
    Reached(TargetDoorState),
    Obstruction(bool),
    MovedExternally(TargetDoorState),
    DoorFault,
    LockTarget(LockTargetState),
    Engaged,
    Released,
    Jammed,
}

fn door_position() -> impl Strategy<Value = TargetDoorState> {
    prop_oneof![Just(TargetDoorState::Open), Just(TargetDoorState::Closed)]
}

fn lock_position() -> impl Strategy<Value = LockTargetState> {
    prop_oneof![Just(LockTargetState::Unsecured), Just(LockTargetState::Secured)]
}

fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        door_position().prop_map(Input::DoorTarget),
        door_position().prop_map(Input::Reached),
        any::<bool>().prop_map(Input::Obstruction),
        door_position().prop_map(Input::MovedExternally),
        Just(Input::DoorFault),
        lock_position().prop_map(Input::LockTarget),
        Just(Input::Engaged),
        Just(Input::Released),
        Just(Input::Jammed),
    ]
}

struct Accessory {
    door: DoorStateMachine,
    lock: LockCoordinator,
}

impl Accessory {
    fn new() -> Self {
        Self {
            door: DoorStateMachine::new(Duration::from_secs(30)),
            lock: LockCoordinator::new(Duration::from_secs(5)),
        }
    }

    fn forward(&mut self, step: DoorStep) {
        for transition in step.transitions {
            self.lock
                .on_door_transition(transition.from, transition.to)
                .unwrap();
        }
    }

    fn apply(&mut self, input: Input) {
        match input {
            Input::DoorTarget(target) => {
                let step = self.door.set_target(target).unwrap();
                self.forward(step);
            }
            Input::Reached(position) => {
                let step = self.door.on_reached(position).unwrap();
                self.forward(step);
            }
            Input::Obstruction(detected) => {
                let step = self.door.on_obstruction(detected).unwrap();
                self.forward(step);
            }
            Input::MovedExternally(position) => {
                let step = self.door.on_moved_externally(position).unwrap();
                self.forward(step);
            }
            Input::DoorFault => {
                let step = self.door.on_fault("drive fault").unwrap();
                self.forward(step);
            }
            Input::LockTarget(target) => {
                self.lock.set_target(target).unwrap();
            }
            Input::Engaged => {
                self.lock.on_engaged().unwrap();
            }
            Input::Released => {
                self.lock.on_released().unwrap();
            }
            Input::Jammed => {
                self.lock.on_jammed("bolt stuck").unwrap();
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_lock_secured_only_when_door_closed(
        inputs in prop::collection::vec(input(), 1..60)
    ) {
        let mut accessory = Accessory::new();
        for input in inputs {
            accessory.apply(input);
            if accessory.lock.current() == LockCurrentState::Secured {
                prop_assert_eq!(accessory.door.current(), CurrentDoorState::Closed);
            }
        }
    }

    #[test]
    fn prop_door_never_reverses_directly(
        inputs in prop::collection::vec(input(), 1..60)
    ) {
        let mut accessory = Accessory::new();
        for input in inputs {
            accessory.apply(input);
        }
        for transition in accessory.door.history().entries() {
            prop_assert!(!(transition.from.is_moving() && transition.to.is_moving()));
        }
    }

    #[test]
    fn prop_obstructed_door_is_never_moving(
        inputs in prop::collection::vec(input(), 1..60)
    ) {
        let mut accessory = Accessory::new();
        for input in inputs {
            accessory.apply(input);
            if accessory.door.is_obstructed() {
                prop_assert!(!accessory.door.current().is_moving());
            }
        }
    }
}
