//! Shared harness for accessory integration tests.

#![allow(dead_code)]

use garage_core::{CharacteristicId, CharacteristicType, ServiceType, SessionId, Value};
use garage_hardware::mock::{
    MockDoor, MockDoorHandle, MockIndicator, MockIndicatorHandle, MockLock, MockLockHandle,
};
use garage_server::{AccessoryConfig, AccessoryServer, EngineEvent, EngineEventKind, IndicatorIdentify};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const EVENT_WAIT: Duration = Duration::from_secs(60);

/// Running accessory with manually driven mock actuators.
pub struct Harness {
    pub server: AccessoryServer,
    pub door: MockDoorHandle,
    pub lock: MockLockHandle,
    pub indicator: MockIndicatorHandle,
    pub events: broadcast::Receiver<EngineEvent>,
    pub session: SessionId,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(AccessoryConfig::default())
    }

    pub fn with_config(config: AccessoryConfig) -> Self {
        let (door, door_handle) = MockDoor::new();
        let (lock, lock_handle) = MockLock::new();
        let (indicator, indicator_handle) = MockIndicator::new();
        let (identify, _task) = IndicatorIdentify::spawn(indicator);

        let server = AccessoryServer::start(config, door, lock, Arc::new(identify)).unwrap();
        let events = server.events();

        Self {
            server,
            door: door_handle,
            lock: lock_handle,
            indicator: indicator_handle,
            events,
            session: SessionId::new(),
        }
    }

    /// Address of a characteristic of the garage door opener service.
    pub fn id(&self, kind: CharacteristicType) -> CharacteristicId {
        self.server
            .characteristic_id(ServiceType::GarageDoorOpener, kind)
            .unwrap()
    }

    pub fn write(&self, kind: CharacteristicType, value: u8) {
        self.server
            .handle_write(self.id(kind), Value::Uint8(value), self.session)
            .unwrap();
    }

    pub fn read(&self, kind: CharacteristicType) -> Value {
        self.server.handle_read(self.id(kind), self.session).unwrap()
    }

    /// Wait for the next engine event matching `predicate`, skipping others.
    pub async fn wait_for(&mut self, predicate: impl Fn(&EngineEventKind) -> bool) -> EngineEventKind {
        timeout(EVENT_WAIT, async {
            loop {
                let event = self.events.recv().await.unwrap();
                if predicate(&event.kind) {
                    return event.kind;
                }
            }
        })
        .await
        .expect("engine event not observed")
    }

    /// Let the engine and dispatcher drain their queues.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    /// Drive the door to `closed` from its initial `stopped` state.
    pub async fn close_door(&mut self) {
        use garage_core::CurrentDoorState as D;

        self.write(CharacteristicType::TargetDoorState, 1);
        self.wait_for(|e| matches!(e, EngineEventKind::DoorTransition { to: D::Closing, .. }))
            .await;
        assert!(self.door.complete().await.unwrap());
        self.wait_for(|e| matches!(e, EngineEventKind::DoorTransition { to: D::Closed, .. }))
            .await;
    }

    /// Wait until the lock mock has an actuation waiting for completion.
    pub async fn wait_for_lock_actuation(&self) {
        timeout(EVENT_WAIT, async {
            while !self.lock.is_pending() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("lock actuation not started");
    }
}
