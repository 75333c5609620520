//! Garage door opener accessory runtime.
//!
//! Wires the HAP data model, the door and lock state machines and the
//! actuators into a running accessory:
//!
//! - [`AccessoryServer`]: facade used by the protocol server
//! - [`AccessoryEngine`]: per-accessory actor owning the state machines
//! - [`ChangeNotifier`]: event fan-out to subscribed controller sessions
//! - [`IdentifyHandler`]: identify routine injected at startup

pub mod config;
pub mod engine;
pub mod identify;
pub mod notifier;
pub mod profile;
pub mod server;
pub mod session;

pub use config::AccessoryConfig;
pub use engine::{AccessoryEngine, EngineCommand, EngineEvent, EngineEventKind, EnginePoints};
pub use identify::{IdentifyHandler, IndicatorIdentify};
pub use notifier::{ChangeNotifier, NotifyReport};
pub use server::AccessoryServer;
pub use session::{ChannelSession, ControllerSession, Notification};
