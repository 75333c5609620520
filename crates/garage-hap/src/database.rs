//! Flat characteristic index over one or more accessory trees.

use crate::accessory::Accessory;
use crate::characteristic::{ChangeObserver, Characteristic};
use crate::snapshot::AccessoriesSnapshot;
use garage_core::{AccessoryId, CharacteristicId, Error, Result, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Owns the accessory trees of a server and indexes every characteristic by
/// its `aid.iid` address.
#[derive(Debug)]
pub struct CharacteristicDatabase {
    accessories: Vec<Accessory>,
    index: HashMap<CharacteristicId, Arc<Characteristic>>,
}

impl CharacteristicDatabase {
    /// Index the given accessories.
    ///
    /// # Errors
    /// `Config` if two accessories share an `aid`.
    pub fn new(accessories: Vec<Accessory>) -> Result<Self> {
        let mut index = HashMap::new();

        for (position, accessory) in accessories.iter().enumerate() {
            if accessories[..position]
                .iter()
                .any(|other| other.aid() == accessory.aid())
            {
                return Err(Error::Config(format!(
                    "Duplicate accessory id {}",
                    accessory.aid()
                )));
            }
            for characteristic in accessory.characteristics() {
                index.insert(characteristic.id(), characteristic.clone());
            }
        }

        info!(
            accessories = accessories.len(),
            characteristics = index.len(),
            "Characteristic database ready"
        );
        Ok(Self { accessories, index })
    }

    pub fn accessories(&self) -> &[Accessory] {
        &self.accessories
    }

    pub fn accessory(&self, aid: AccessoryId) -> Option<&Accessory> {
        self.accessories.iter().find(|a| a.aid() == aid)
    }

    /// # Errors
    /// `UnknownCharacteristic` if no characteristic has this address.
    pub fn get(&self, id: CharacteristicId) -> Result<&Arc<Characteristic>> {
        self.index.get(&id).ok_or(Error::UnknownCharacteristic(id))
    }

    /// # Errors
    /// See [`Characteristic::read`].
    pub fn read(&self, id: CharacteristicId) -> Result<Value> {
        self.get(id)?.read()
    }

    /// # Errors
    /// See [`Characteristic::write`].
    pub fn write(&self, id: CharacteristicId, value: Value) -> Result<()> {
        self.get(id)?.write(value)
    }

    pub fn attach_observer(&self, observer: Arc<dyn ChangeObserver>) {
        for accessory in &self.accessories {
            accessory.attach_observer(&observer);
        }
    }

    /// Point-in-time view of every accessory, as listed by `/accessories`.
    pub fn snapshot(&self) -> AccessoriesSnapshot {
        AccessoriesSnapshot::capture(&self.accessories)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristic::CharacteristicBuilder;
    use garage_core::{AccessoryCategory, CharacteristicType, InstanceId, ServiceType};

    fn accessory(aid: u64) -> Accessory {
        Accessory::builder(AccessoryId::new(aid), AccessoryCategory::GarageDoorOpener)
            .primary_service(
                ServiceType::GarageDoorOpener,
                [CharacteristicBuilder::new(CharacteristicType::TargetDoorState).value(1u8)],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_address() {
        let db = CharacteristicDatabase::new(vec![accessory(1), accessory(2)]).unwrap();
        assert_eq!(db.len(), 2);

        let id = CharacteristicId::new(AccessoryId::new(2), InstanceId::new(2));
        db.write(id, Value::Uint8(0)).unwrap();
        assert_eq!(db.read(id).unwrap(), Value::Uint8(0));

        let other = CharacteristicId::new(AccessoryId::new(1), InstanceId::new(2));
        assert_eq!(db.read(other).unwrap(), Value::Uint8(1));
    }

    #[test]
    fn test_unknown_characteristic() {
        let db = CharacteristicDatabase::new(vec![accessory(1)]).unwrap();
        let id = CharacteristicId::new(AccessoryId::new(1), InstanceId::new(99));
        assert_eq!(db.read(id), Err(Error::UnknownCharacteristic(id)));
    }

    #[test]
    fn test_duplicate_aid_rejected() {
        let result = CharacteristicDatabase::new(vec![accessory(1), accessory(1)]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
