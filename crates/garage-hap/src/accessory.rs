//! Accessory tree.
//!
//! An [`Accessory`] owns an ordered list of [`Service`]s, each owning an
//! ordered list of characteristics. The tree is built once through
//! [`AccessoryBuilder`] and only characteristic values change afterwards.

use crate::characteristic::{ChangeObserver, Characteristic, CharacteristicBuilder};
use crate::service::Service;
use garage_core::constants::FIRST_INSTANCE_ID;
use garage_core::{
    AccessoryCategory, AccessoryId, CharacteristicId, CharacteristicType, Error, InstanceId,
    Result, ServiceType,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct Accessory {
    aid: AccessoryId,
    category: AccessoryCategory,
    services: Vec<Service>,
}

impl Accessory {
    #[must_use]
    pub fn builder(aid: AccessoryId, category: AccessoryCategory) -> AccessoryBuilder {
        AccessoryBuilder::new(aid, category)
    }

    pub fn aid(&self) -> AccessoryId {
        self.aid
    }

    pub fn category(&self) -> AccessoryCategory {
        self.category
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// The service marked primary, if any.
    pub fn primary_service(&self) -> Option<&Service> {
        self.services.iter().find(|s| s.is_primary())
    }

    pub fn service(&self, kind: ServiceType) -> Option<&Service> {
        self.services.iter().find(|s| s.kind() == kind)
    }

    /// All characteristics in declaration order.
    pub fn characteristics(&self) -> impl Iterator<Item = &Arc<Characteristic>> {
        self.services.iter().flat_map(|s| s.characteristics().iter())
    }

    /// Look up a characteristic by type within a service.
    ///
    /// # Errors
    /// `Config` if the service or characteristic is not declared.
    pub fn characteristic(
        &self,
        service: ServiceType,
        kind: CharacteristicType,
    ) -> Result<Arc<Characteristic>> {
        self.service(service)
            .and_then(|s| s.characteristic(kind))
            .cloned()
            .ok_or_else(|| {
                Error::Config(format!(
                    "Accessory {} has no {kind} characteristic in {service}",
                    self.aid
                ))
            })
    }

    /// Attach a change observer to every characteristic of the tree.
    pub fn attach_observer(&self, observer: &Arc<dyn ChangeObserver>) {
        for characteristic in self.characteristics() {
            if !characteristic.attach_observer(observer.clone()) {
                debug!(id = %characteristic.id(), "Change observer already attached");
            }
        }
    }
}

struct ServiceDeclaration {
    kind: ServiceType,
    primary: bool,
    characteristics: Vec<CharacteristicBuilder>,
}

/// Builds an [`Accessory`], assigning instance ids in declaration order.
///
/// Services and characteristics share a single instance id space starting at
/// 1, so the first service (Accessory Information) receives iid 1 and its
/// characteristics follow.
pub struct AccessoryBuilder {
    aid: AccessoryId,
    category: AccessoryCategory,
    services: Vec<ServiceDeclaration>,
}

impl AccessoryBuilder {
    #[must_use]
    pub fn new(aid: AccessoryId, category: AccessoryCategory) -> Self {
        Self {
            aid,
            category,
            services: Vec::new(),
        }
    }

    #[must_use]
    pub fn service(
        mut self,
        kind: ServiceType,
        characteristics: impl IntoIterator<Item = CharacteristicBuilder>,
    ) -> Self {
        self.services.push(ServiceDeclaration {
            kind,
            primary: false,
            characteristics: characteristics.into_iter().collect(),
        });
        self
    }

    #[must_use]
    pub fn primary_service(
        mut self,
        kind: ServiceType,
        characteristics: impl IntoIterator<Item = CharacteristicBuilder>,
    ) -> Self {
        self.services.push(ServiceDeclaration {
            kind,
            primary: true,
            characteristics: characteristics.into_iter().collect(),
        });
        self
    }

    /// Assign ids and build the tree.
    ///
    /// # Errors
    /// `Config` if more than one service is marked primary, or
    /// `InvalidValue` if a characteristic's initial value is out of contract.
    pub fn build(self) -> Result<Accessory> {
        let primaries = self.services.iter().filter(|s| s.primary).count();
        if primaries > 1 {
            return Err(Error::Config(format!(
                "Accessory {} declares {primaries} primary services",
                self.aid
            )));
        }

        let mut next_iid = FIRST_INSTANCE_ID;
        let mut services = Vec::with_capacity(self.services.len());

        for declaration in self.services {
            let service_iid = InstanceId::new(next_iid);
            next_iid += 1;

            let mut characteristics = Vec::with_capacity(declaration.characteristics.len());
            for builder in declaration.characteristics {
                let id = CharacteristicId::new(self.aid, InstanceId::new(next_iid));
                next_iid += 1;
                characteristics.push(Arc::new(builder.build(id)?));
            }

            services.push(Service::new(
                service_iid,
                declaration.kind,
                declaration.primary,
                characteristics,
            ));
        }

        debug!(aid = %self.aid, services = services.len(), "Accessory tree built");
        Ok(Accessory {
            aid: self.aid,
            category: self.category,
            services,
        })
    }
}
