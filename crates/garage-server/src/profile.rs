//! Garage door opener accessory profile.
//!
//! Builds the accessory tree (Accessory Information plus the primary Garage
//! Door Opener service) and wires the writable characteristics to the
//! engine and the identify handler.

use crate::config::AccessoryConfig;
use crate::engine::EngineCommand;
use crate::identify::IdentifyHandler;
use garage_core::{
    AccessoryCategory, CharacteristicType as C, CurrentDoorState, LockCurrentState,
    LockTargetState, Result, ServiceType, TargetDoorState,
};
use garage_hap::{Accessory, CharacteristicBuilder};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Build the accessory tree for `config`.
///
/// Target writes are forwarded to the engine from inside the
/// characteristic's critical section, so the engine receives them in commit
/// order. A full queue or a stopped engine vetoes the write.
///
/// # Errors
/// `InvalidValue` or `Config` if the configuration does not fit the profile.
pub fn garage_door_opener(
    config: &AccessoryConfig,
    commands: mpsc::WeakSender<EngineCommand>,
    identify: Arc<dyn IdentifyHandler>,
) -> Result<Accessory> {
    let door_commands = commands.clone();
    let lock_commands = commands;

    let information = [
        CharacteristicBuilder::new(C::Name).value(config.name.as_str()),
        CharacteristicBuilder::new(C::Manufacturer).value(config.manufacturer.as_str()),
        CharacteristicBuilder::new(C::SerialNumber).value(config.serial_number.as_str()),
        CharacteristicBuilder::new(C::Model).value(config.model.as_str()),
        CharacteristicBuilder::new(C::FirmwareRevision).value(config.firmware_revision.as_str()),
        CharacteristicBuilder::new(C::Identify).on_write(move |_, proposed| {
            if proposed.as_bool() == Some(true) {
                identify.identify();
            }
            Ok(())
        }),
    ];

    let initial_door = if config.initial_door_state.is_moving() {
        CurrentDoorState::Stopped
    } else {
        config.initial_door_state
    };

    let opener = [
        CharacteristicBuilder::new(C::CurrentDoorState).value(initial_door),
        CharacteristicBuilder::new(C::TargetDoorState)
            .value(config.initial_door_target)
            .on_write(move |_, proposed| {
                let target = proposed
                    .as_u8()
                    .and_then(TargetDoorState::from_u8)
                    .ok_or("not a door target")?;
                dispatch(&door_commands, EngineCommand::SetDoorTarget(target))
            }),
        CharacteristicBuilder::new(C::ObstructionDetected).value(false),
        CharacteristicBuilder::new(C::Name).value(config.name.as_str()),
        CharacteristicBuilder::new(C::LockCurrentState).value(LockCurrentState::Unknown),
        CharacteristicBuilder::new(C::LockTargetState)
            .value(LockTargetState::Unsecured)
            .on_write(move |_, proposed| {
                let target = proposed
                    .as_u8()
                    .and_then(LockTargetState::from_u8)
                    .ok_or("not a lock target")?;
                dispatch(&lock_commands, EngineCommand::SetLockTarget(target))
            }),
    ];

    Accessory::builder(config.aid(), AccessoryCategory::GarageDoorOpener)
        .service(ServiceType::AccessoryInformation, information)
        .primary_service(ServiceType::GarageDoorOpener, opener)
        .build()
}

fn dispatch(
    commands: &mpsc::WeakSender<EngineCommand>,
    command: EngineCommand,
) -> std::result::Result<(), String> {
    let sender = commands
        .upgrade()
        .ok_or_else(|| "accessory engine is not running".to_string())?;
    sender.try_send(command).map_err(|err| match err {
        TrySendError::Full(_) => "accessory engine is busy".to_string(),
        TrySendError::Closed(_) => "accessory engine is not running".to_string(),
    })?;
    debug!(?command, "Target forwarded to engine");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_core::{Error, InstanceId, Value};

    struct NoIdentify;

    impl IdentifyHandler for NoIdentify {
        fn identify(&self) {}
    }

    type Built = (
        Accessory,
        mpsc::Receiver<EngineCommand>,
        mpsc::Sender<EngineCommand>,
    );

    fn build(config: &AccessoryConfig) -> Built {
        let (tx, rx) = mpsc::channel(1);
        let accessory = garage_door_opener(config, tx.downgrade(), Arc::new(NoIdentify)).unwrap();
        (accessory, rx, tx)
    }

    fn initial_value(accessory: &Accessory, service: ServiceType, kind: C) -> Value {
        accessory.characteristic(service, kind).unwrap().value()
    }

    #[test]
    fn test_instance_ids_follow_declaration_order() {
        let (accessory, _rx, _tx) = build(&AccessoryConfig::default());
        let iids: Vec<u64> = accessory
            .characteristics()
            .map(|c| c.id().iid.as_u64())
            .collect();
        assert_eq!(iids, vec![2, 3, 4, 5, 6, 7, 9, 10, 11, 12, 13, 14]);
        assert_eq!(
            accessory.primary_service().unwrap().iid(),
            InstanceId::new(8)
        );
    }

    #[test]
    fn test_initial_values() {
        let (accessory, _rx, _tx) = build(&AccessoryConfig::default());
        let opener = ServiceType::GarageDoorOpener;
        assert_eq!(initial_value(&accessory, opener, C::CurrentDoorState), Value::Uint8(4));
        assert_eq!(initial_value(&accessory, opener, C::TargetDoorState), Value::Uint8(1));
        assert_eq!(initial_value(&accessory, opener, C::LockCurrentState), Value::Uint8(3));
        assert_eq!(initial_value(&accessory, opener, C::LockTargetState), Value::Uint8(0));
        assert_eq!(
            initial_value(&accessory, ServiceType::AccessoryInformation, C::Manufacturer),
            Value::from("Arduino HomeKit")
        );
    }

    #[test]
    fn test_target_write_is_forwarded() {
        let (accessory, mut rx, _tx) = build(&AccessoryConfig::default());
        let target = accessory
            .characteristic(ServiceType::GarageDoorOpener, C::TargetDoorState)
            .unwrap();

        target.write(Value::Uint8(0)).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::SetDoorTarget(TargetDoorState::Open)
        );
    }

    #[test]
    fn test_full_queue_rejects_write() {
        let (accessory, _rx, _tx) = build(&AccessoryConfig::default());
        let target = accessory
            .characteristic(ServiceType::GarageDoorOpener, C::LockTargetState)
            .unwrap();

        target.write(Value::Uint8(1)).unwrap();
        let err = target.write(Value::Uint8(0)).unwrap_err();
        assert!(matches!(err, Error::RejectedByHandler { .. }));
        assert_eq!(target.value(), Value::Uint8(1));
    }

    #[test]
    fn test_stopped_engine_rejects_write() {
        let (accessory, rx, tx) = build(&AccessoryConfig::default());
        drop(rx);
        drop(tx);
        let target = accessory
            .characteristic(ServiceType::GarageDoorOpener, C::TargetDoorState)
            .unwrap();

        let err = target.write(Value::Uint8(0)).unwrap_err();
        assert!(matches!(err, Error::RejectedByHandler { .. }));
    }
}
