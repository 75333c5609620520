//! Accessory server facade.
//!
//! [`AccessoryServer`] is what a HAP protocol server talks to. It owns the
//! characteristic database, the change notifier and the running engine, and
//! exposes the transport-agnostic operations a controller session needs:
//! listing accessories, reading and writing characteristics, managing event
//! subscriptions and triggering identify.
//!
//! # Example
//!
//! ```no_run
//! use garage_core::{CharacteristicType, ServiceType, SessionId, Value};
//! use garage_hardware::mock::{MockDoor, MockLock};
//! use garage_server::{AccessoryConfig, AccessoryServer, IdentifyHandler};
//! use std::sync::Arc;
//!
//! struct Quiet;
//! impl IdentifyHandler for Quiet {
//!     fn identify(&self) {}
//! }
//!
//! # async fn example() -> garage_core::Result<()> {
//! let (door, _door_handle) = MockDoor::new();
//! let (lock, _lock_handle) = MockLock::new();
//! let server = AccessoryServer::start(AccessoryConfig::default(), door, lock, Arc::new(Quiet))?;
//!
//! let target = server.characteristic_id(ServiceType::GarageDoorOpener, CharacteristicType::TargetDoorState)?;
//! server.handle_write(target, Value::Uint8(0), SessionId::new())?;
//! # Ok(())
//! # }
//! ```

use crate::config::AccessoryConfig;
use crate::engine::{AccessoryEngine, EngineCommand, EngineEvent, EnginePoints};
use crate::identify::IdentifyHandler;
use crate::notifier::ChangeNotifier;
use crate::profile;
use crate::session::ControllerSession;
use garage_control::{DoorStateMachine, LockCoordinator};
use garage_core::{
    AccessoryId, CharacteristicId, CharacteristicType, Error, Result, ServiceType, SessionId,
    SetupCode, Value,
};
use garage_hap::{AccessoriesSnapshot, CharacteristicDatabase};
use garage_hardware::{AnyDoorActuator, AnyLockActuator};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Running garage door opener accessory.
pub struct AccessoryServer {
    aid: AccessoryId,
    database: CharacteristicDatabase,
    notifier: Arc<ChangeNotifier>,
    identify: Arc<dyn IdentifyHandler>,
    setup_code: SetupCode,
    commands: mpsc::Sender<EngineCommand>,
    events: broadcast::Sender<EngineEvent>,
    engine: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl AccessoryServer {
    /// Build the accessory from `config` and start its engine.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// `Config` if the configuration is invalid.
    pub fn start(
        config: AccessoryConfig,
        door: impl Into<AnyDoorActuator>,
        lock: impl Into<AnyLockActuator>,
        identify: Arc<dyn IdentifyHandler>,
    ) -> Result<Self> {
        config.validate()?;
        if config.setup_code.is_trivial() {
            warn!("Setup code is trivial and will be refused by HomeKit controllers");
        }

        let (commands, command_rx) = mpsc::channel(config.command_capacity);
        let (events, _) = broadcast::channel(config.event_capacity);

        let accessory =
            profile::garage_door_opener(&config, commands.downgrade(), identify.clone())?;
        let point = |kind| accessory.characteristic(ServiceType::GarageDoorOpener, kind);
        let points = EnginePoints {
            current_door: point(CharacteristicType::CurrentDoorState)?,
            target_door: point(CharacteristicType::TargetDoorState)?,
            obstruction: point(CharacteristicType::ObstructionDetected)?,
            lock_current: point(CharacteristicType::LockCurrentState)?,
        };

        let database = CharacteristicDatabase::new(vec![accessory])?;
        let (notifier, dispatcher) = ChangeNotifier::spawn();
        database.attach_observer(notifier.clone());

        let door_machine = DoorStateMachine::builder()
            .with_initial_state(config.initial_door_state)
            .with_target(config.initial_door_target)
            .with_travel_timeout(config.door_travel_timeout())
            .build();
        let lock_coordinator = LockCoordinator::new(config.lock_actuation_timeout())
            .with_door_state(door_machine.current());

        let engine = AccessoryEngine::new(
            door_machine,
            lock_coordinator,
            door.into(),
            lock.into(),
            points,
            command_rx,
            events.clone(),
        )
        .spawn();

        info!(
            aid = %config.aid(),
            name = %config.name,
            characteristics = database.len(),
            "Accessory server started"
        );

        Ok(Self {
            aid: config.aid(),
            database,
            notifier,
            identify,
            setup_code: config.setup_code,
            commands,
            events,
            engine,
            dispatcher,
        })
    }

    pub fn aid(&self) -> AccessoryId {
        self.aid
    }

    /// Snapshot of the accessory tree as served by `GET /accessories`.
    pub fn list_accessories(&self) -> AccessoriesSnapshot {
        self.database.snapshot()
    }

    /// Address of a characteristic of this accessory.
    ///
    /// # Errors
    /// `Config` if the service does not declare the characteristic.
    pub fn characteristic_id(
        &self,
        service: ServiceType,
        kind: CharacteristicType,
    ) -> Result<CharacteristicId> {
        let accessory = self
            .database
            .accessory(self.aid)
            .ok_or_else(|| Error::Config(format!("Accessory {} is not registered", self.aid)))?;
        Ok(accessory.characteristic(service, kind)?.id())
    }

    /// # Errors
    /// `UnknownCharacteristic` or `NotReadable`.
    pub fn handle_read(&self, id: CharacteristicId, session: SessionId) -> Result<Value> {
        let result = self.database.read(id);
        match &result {
            Ok(value) => trace!(%id, %session, %value, "Read"),
            Err(err) => debug!(%id, %session, error = %err, status = err.hap_status(), "Read failed"),
        }
        result
    }

    /// # Errors
    /// `UnknownCharacteristic`, `NotWritable`, `InvalidValue` or
    /// `RejectedByHandler`. The stored value is unchanged on error.
    pub fn handle_write(&self, id: CharacteristicId, value: Value, session: SessionId) -> Result<()> {
        debug!(%id, %session, %value, "Write");
        let result = self.database.write(id, value);
        if let Err(err) = &result {
            debug!(%id, %session, error = %err, status = err.hap_status(), "Write failed");
        }
        result
    }

    /// Subscribe `session` to value events of `id`.
    ///
    /// # Errors
    /// `UnknownCharacteristic`, or `NotNotifiable` if the characteristic does
    /// not support events.
    pub fn subscribe(&self, id: CharacteristicId, session: Arc<dyn ControllerSession>) -> Result<()> {
        let characteristic = self.database.get(id)?;
        if !characteristic.permissions().notifiable() {
            return Err(Error::NotNotifiable(id));
        }
        self.notifier.subscribe(id, session);
        Ok(())
    }

    /// Returns `false` if the session was not subscribed.
    ///
    /// # Errors
    /// `UnknownCharacteristic`.
    pub fn unsubscribe(&self, id: CharacteristicId, session: SessionId) -> Result<bool> {
        self.database.get(id)?;
        Ok(self.notifier.unsubscribe(id, session))
    }

    /// Drop every subscription of a session, typically when it disconnects.
    pub fn unsubscribe_all(&self, session: SessionId) -> usize {
        self.notifier.unsubscribe_all(session)
    }

    pub fn identify(&self) {
        self.identify.identify();
    }

    /// Stream of engine events. Only events published after the call are seen.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Compare a pairing attempt against the configured setup code in
    /// constant time.
    pub fn verify_setup_code(&self, candidate: &str) -> bool {
        self.setup_code.verify(candidate)
    }

    /// Stop the engine and wait for pending notifications to drain.
    pub async fn shutdown(self) {
        let Self {
            database,
            notifier,
            commands,
            engine,
            dispatcher,
            ..
        } = self;

        drop(commands);
        if let Err(err) = engine.await {
            warn!(error = %err, "Accessory engine task failed");
        }
        drop(database);
        drop(notifier);
        if let Err(err) = dispatcher.await {
            warn!(error = %err, "Change dispatcher task failed");
        }
        info!("Accessory server stopped");
    }
}

impl std::fmt::Debug for AccessoryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("AccessoryServer")
            .field("aid", &self.aid)
            .field("database", &self.database)
            .field("setup_code", &self.setup_code)
            .finish_non_exhaustive()
    }
}
