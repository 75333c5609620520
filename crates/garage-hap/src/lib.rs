//! HAP data model for the garage door opener.
//!
//! Characteristic value cells, the accessory → service → characteristic
//! tree, the flat characteristic index and the `/accessories` snapshot.

pub mod accessory;
pub mod characteristic;
pub mod database;
pub mod service;
pub mod snapshot;

pub use accessory::{Accessory, AccessoryBuilder};
pub use characteristic::{ChangeObserver, Characteristic, CharacteristicBuilder, ReadHook, WriteHook};
pub use database::CharacteristicDatabase;
pub use service::Service;
pub use snapshot::{AccessoriesSnapshot, AccessorySnapshot, CharacteristicSnapshot, ServiceSnapshot};
