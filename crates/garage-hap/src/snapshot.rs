//! Serializable view of the accessory tree in the HAP `/accessories` shape.
//!
//! ```json
//! {"accessories":[{"aid":1,"services":[{"iid":1,"type":"3E","primary":false,
//!   "characteristics":[{"iid":2,"type":"23","format":"string","perms":["pr"],
//!   "value":"GarageDoorOpener-01","maxLen":64}]}]}]}
//! ```
//!
//! Values of characteristics without the read permission are omitted.

use crate::accessory::Accessory;
use crate::characteristic::Characteristic;
use crate::service::Service;
use garage_core::{AccessoryId, Constraints, Format, InstanceId, Permissions, Value};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AccessoriesSnapshot {
    pub accessories: Vec<AccessorySnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessorySnapshot {
    pub aid: AccessoryId,
    pub services: Vec<ServiceSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub iid: InstanceId,
    #[serde(rename = "type")]
    pub kind: String,
    pub primary: bool,
    pub characteristics: Vec<CharacteristicSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicSnapshot {
    pub iid: InstanceId,
    #[serde(rename = "type")]
    pub kind: String,
    pub format: Format,
    pub perms: Permissions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub constraints: Constraints,
}

impl AccessoriesSnapshot {
    pub fn capture(accessories: &[Accessory]) -> Self {
        Self {
            accessories: accessories.iter().map(AccessorySnapshot::capture).collect(),
        }
    }

    /// Render as a JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Find a characteristic entry by address.
    pub fn characteristic(&self, aid: AccessoryId, iid: InstanceId) -> Option<&CharacteristicSnapshot> {
        self.accessories
            .iter()
            .filter(|a| a.aid == aid)
            .flat_map(|a| a.services.iter())
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.iid == iid)
    }
}

impl AccessorySnapshot {
    fn capture(accessory: &Accessory) -> Self {
        Self {
            aid: accessory.aid(),
            services: accessory.services().iter().map(ServiceSnapshot::capture).collect(),
        }
    }
}

impl ServiceSnapshot {
    fn capture(service: &Service) -> Self {
        Self {
            iid: service.iid(),
            kind: format!("{:X}", service.kind().short_type()),
            primary: service.is_primary(),
            characteristics: service
                .characteristics()
                .iter()
                .map(|c| CharacteristicSnapshot::capture(c))
                .collect(),
        }
    }
}

impl CharacteristicSnapshot {
    fn capture(characteristic: &Characteristic) -> Self {
        let perms = characteristic.permissions();
        Self {
            iid: characteristic.id().iid,
            kind: format!("{:X}", characteristic.kind().short_type()),
            format: characteristic.format(),
            perms,
            value: perms.readable().then(|| characteristic.value()),
            constraints: characteristic.constraints().clone(),
        }
    }
}
