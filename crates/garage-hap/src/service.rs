use crate::characteristic::Characteristic;
use garage_core::{CharacteristicType, InstanceId, ServiceType};
use std::sync::Arc;

/// A HAP service: an ordered group of characteristics.
///
/// Characteristics are shared by reference with the flat lookup index held
/// by the characteristic database.
#[derive(Debug)]
pub struct Service {
    iid: InstanceId,
    kind: ServiceType,
    primary: bool,
    characteristics: Vec<Arc<Characteristic>>,
}

impl Service {
    pub(crate) fn new(
        iid: InstanceId,
        kind: ServiceType,
        primary: bool,
        characteristics: Vec<Arc<Characteristic>>,
    ) -> Self {
        Self {
            iid,
            kind,
            primary,
            characteristics,
        }
    }

    pub fn iid(&self) -> InstanceId {
        self.iid
    }

    pub fn kind(&self) -> ServiceType {
        self.kind
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn characteristics(&self) -> &[Arc<Characteristic>] {
        &self.characteristics
    }

    /// First characteristic of the given type, in declaration order.
    pub fn characteristic(&self, kind: CharacteristicType) -> Option<&Arc<Characteristic>> {
        self.characteristics.iter().find(|c| c.kind() == kind)
    }
}
