//! Controller session port.
//!
//! The protocol server owns the real sessions (one per paired controller
//! connection). The accessory core only needs an identity and a way to push
//! an event to the controller.

use chrono::{DateTime, Utc};
use garage_core::{CharacteristicId, Error, Result, SessionId, Value};
use serde::Serialize;
use tokio::sync::mpsc;

/// A connected controller that can receive characteristic events.
pub trait ControllerSession: Send + Sync {
    fn id(&self) -> SessionId;

    /// Deliver one event. Must not block; a transport that cannot accept the
    /// event right now should fail instead.
    ///
    /// # Errors
    /// Any error is treated as a failed delivery for this session only.
    fn push(&self, id: CharacteristicId, value: &Value) -> Result<()>;
}

/// Event pushed to a controller session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub characteristic: CharacteristicId,
    pub value: Value,
    pub sent_at: DateTime<Utc>,
}

/// Session that forwards every event into an unbounded channel.
///
/// Used by the console front end and by tests as a stand-in for a network
/// connection.
#[derive(Debug)]
pub struct ChannelSession {
    id: SessionId,
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSession {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }
}

impl ControllerSession for ChannelSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn push(&self, id: CharacteristicId, value: &Value) -> Result<()> {
        self.tx
            .send(Notification {
                characteristic: id,
                value: value.clone(),
                sent_at: Utc::now(),
            })
            .map_err(|_| Error::Io(format!("session {} is closed", self.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_core::{AccessoryId, InstanceId};

    #[test]
    fn test_push_after_receiver_dropped_fails() {
        let (session, rx) = ChannelSession::new();
        let id = CharacteristicId::new(AccessoryId::new(1), InstanceId::new(9));

        session.push(id, &Value::Uint8(1)).unwrap();
        drop(rx);
        assert!(matches!(session.push(id, &Value::Uint8(0)), Err(Error::Io(_))));
    }

    #[test]
    fn test_notification_serializes_value_and_address() {
        let (session, mut rx) = ChannelSession::new();
        let id = CharacteristicId::new(AccessoryId::new(1), InstanceId::new(9));
        session.push(id, &Value::Uint8(2)).unwrap();

        let notification = rx.try_recv().unwrap();
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["value"], 2);
        assert!(json.get("sent_at").is_some());
    }
}
