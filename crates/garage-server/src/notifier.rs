//! Change notifier.
//!
//! Fans characteristic value changes out to the controller sessions that
//! subscribed to them. Recipients are captured when the change commits
//! (inside the characteristic's critical section); delivery happens later on
//! a dispatcher task fed by an unbounded queue, so a writer never waits for
//! a slow controller.
//!
//! Delivery is best effort. A session whose `push` fails does not affect the
//! others; failures are collected in a [`NotifyReport`] and logged.

use crate::session::ControllerSession;
use garage_core::{CharacteristicId, Error, Result, SessionId, Value};
use garage_hap::ChangeObserver;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type Subscribers = HashMap<SessionId, Arc<dyn ControllerSession>>;

/// Outcome of delivering one change to its captured recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyReport {
    pub characteristic: CharacteristicId,
    pub delivered: usize,
    pub failures: Vec<(SessionId, Error)>,
}

impl NotifyReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// # Errors
    /// `PartialNotifyFailure` if at least one delivery failed.
    pub fn into_result(self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(Error::PartialNotifyFailure {
                delivered: self.delivered,
                attempted: self.attempted(),
            })
        }
    }
}

struct PendingChange {
    characteristic: CharacteristicId,
    value: Value,
    recipients: Vec<Arc<dyn ControllerSession>>,
}

/// Subscription table plus delivery queue.
pub struct ChangeNotifier {
    subscriptions: RwLock<HashMap<CharacteristicId, Subscribers>>,
    queue: mpsc::UnboundedSender<PendingChange>,
}

impl ChangeNotifier {
    /// Create a notifier and spawn its dispatcher task.
    ///
    /// The dispatcher stops once the notifier is dropped and the queue has
    /// drained. Must be called from within a Tokio runtime.
    pub fn spawn() -> (Arc<Self>, JoinHandle<()>) {
        let (queue, mut rx) = mpsc::unbounded_channel::<PendingChange>();
        let notifier = Arc::new(Self {
            subscriptions: RwLock::new(HashMap::new()),
            queue,
        });

        let dispatcher = tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                let report = deliver(&change);
                log_report(&report);
            }
            debug!("Change dispatcher stopped");
        });

        (notifier, dispatcher)
    }

    /// Subscribe `session` to changes of `id`. Returns `false` if it already was.
    pub fn subscribe(&self, id: CharacteristicId, session: Arc<dyn ControllerSession>) -> bool {
        let session_id = session.id();
        let added = self
            .write()
            .entry(id)
            .or_default()
            .insert(session_id, session)
            .is_none();
        if added {
            debug!(%id, session = %session_id, "Subscribed");
        }
        added
    }

    /// Returns `false` if the session was not subscribed.
    pub fn unsubscribe(&self, id: CharacteristicId, session: SessionId) -> bool {
        let mut subscriptions = self.write();
        let Some(subscribers) = subscriptions.get_mut(&id) else {
            return false;
        };
        let removed = subscribers.remove(&session).is_some();
        if subscribers.is_empty() {
            subscriptions.remove(&id);
        }
        if removed {
            debug!(%id, %session, "Unsubscribed");
        }
        removed
    }

    /// Drop every subscription held by `session`. Returns how many were removed.
    pub fn unsubscribe_all(&self, session: SessionId) -> usize {
        let mut subscriptions = self.write();
        let mut removed = 0;
        subscriptions.retain(|_, subscribers| {
            if subscribers.remove(&session).is_some() {
                removed += 1;
            }
            !subscribers.is_empty()
        });
        debug!(%session, removed, "Session subscriptions cleared");
        removed
    }

    pub fn subscribers(&self, id: CharacteristicId) -> Vec<SessionId> {
        self.read()
            .get(&id)
            .map(|subscribers| subscribers.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, id: CharacteristicId, session: SessionId) -> bool {
        self.read()
            .get(&id)
            .is_some_and(|subscribers| subscribers.contains_key(&session))
    }

    /// Deliver a change to the current subscribers right away.
    pub fn notify(&self, id: CharacteristicId, value: &Value) -> NotifyReport {
        let change = PendingChange {
            characteristic: id,
            value: value.clone(),
            recipients: self.recipients(id),
        };
        let report = deliver(&change);
        log_report(&report);
        report
    }

    fn recipients(&self, id: CharacteristicId) -> Vec<Arc<dyn ControllerSession>> {
        self.read()
            .get(&id)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CharacteristicId, Subscribers>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CharacteristicId, Subscribers>> {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChangeObserver for ChangeNotifier {
    fn value_changed(&self, id: CharacteristicId, value: &Value) {
        let recipients = self.recipients(id);
        if recipients.is_empty() {
            return;
        }

        trace!(%id, %value, recipients = recipients.len(), "Queueing change");
        let change = PendingChange {
            characteristic: id,
            value: value.clone(),
            recipients,
        };
        if self.queue.send(change).is_err() {
            warn!(%id, "Change dispatcher is gone, event dropped");
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("characteristics", &self.read().len())
            .finish_non_exhaustive()
    }
}

fn deliver(change: &PendingChange) -> NotifyReport {
    let mut report = NotifyReport {
        characteristic: change.characteristic,
        delivered: 0,
        failures: Vec::new(),
    };
    for session in &change.recipients {
        match session.push(change.characteristic, &change.value) {
            Ok(()) => report.delivered += 1,
            Err(err) => report.failures.push((session.id(), err)),
        }
    }
    report
}

fn log_report(report: &NotifyReport) {
    if report.is_complete() {
        trace!(id = %report.characteristic, delivered = report.delivered, "Change delivered");
        return;
    }
    for (session, err) in &report.failures {
        warn!(id = %report.characteristic, %session, error = %err, "Event delivery failed");
    }
    warn!(
        id = %report.characteristic,
        delivered = report.delivered,
        attempted = report.attempted(),
        "Partial notification failure"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChannelSession;
    use garage_core::{AccessoryId, InstanceId};

    struct ClosedSession(SessionId);

    impl ControllerSession for ClosedSession {
        fn id(&self) -> SessionId {
            self.0
        }

        fn push(&self, _id: CharacteristicId, _value: &Value) -> Result<()> {
            Err(Error::Io("connection reset".to_string()))
        }
    }

    fn cid(iid: u64) -> CharacteristicId {
        CharacteristicId::new(AccessoryId::new(1), InstanceId::new(iid))
    }

    #[tokio::test]
    async fn test_notify_reaches_all_subscribers() {
        let (notifier, _dispatcher) = ChangeNotifier::spawn();
        let (first, mut first_rx) = ChannelSession::new();
        let (second, mut second_rx) = ChannelSession::new();
        notifier.subscribe(cid(9), Arc::new(first));
        notifier.subscribe(cid(9), Arc::new(second));

        let report = notifier.notify(cid(9), &Value::Uint8(1));
        assert_eq!(report.delivered, 2);
        assert!(report.is_complete());
        assert_eq!(first_rx.try_recv().unwrap().value, Value::Uint8(1));
        assert_eq!(second_rx.try_recv().unwrap().value, Value::Uint8(1));
    }

    #[tokio::test]
    async fn test_failed_session_does_not_block_others() {
        let (notifier, _dispatcher) = ChangeNotifier::spawn();
        let (healthy, mut rx) = ChannelSession::new();
        let broken = SessionId::new();
        notifier.subscribe(cid(9), Arc::new(ClosedSession(broken)));
        notifier.subscribe(cid(9), Arc::new(healthy));

        let report = notifier.notify(cid(9), &Value::Uint8(0));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, broken);
        assert!(rx.try_recv().is_ok());

        assert_eq!(
            report.into_result(),
            Err(Error::PartialNotifyFailure {
                delivered: 1,
                attempted: 2
            })
        );
    }

    #[tokio::test]
    async fn test_observer_path_uses_dispatcher() {
        let (notifier, _dispatcher) = ChangeNotifier::spawn();
        let (session, mut rx) = ChannelSession::new();
        notifier.subscribe(cid(11), Arc::new(session));

        notifier.value_changed(cid(11), &Value::Uint8(1));
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.characteristic, cid(11));
        assert_eq!(notification.value, Value::Uint8(1));
    }

    #[tokio::test]
    async fn test_unsubscribe_all_removes_every_subscription() {
        let (notifier, _dispatcher) = ChangeNotifier::spawn();
        let (session, _rx) = ChannelSession::new();
        let session_id = session.id();
        let session: Arc<dyn ControllerSession> = Arc::new(session);

        assert!(notifier.subscribe(cid(9), session.clone()));
        assert!(!notifier.subscribe(cid(9), session.clone()));
        notifier.subscribe(cid(12), session);

        assert_eq!(notifier.unsubscribe_all(session_id), 2);
        assert!(notifier.subscribers(cid(9)).is_empty());
        assert!(!notifier.unsubscribe(cid(12), session_id));
    }

    #[tokio::test]
    async fn test_change_without_subscribers_is_dropped() {
        let (notifier, _dispatcher) = ChangeNotifier::spawn();
        notifier.value_changed(cid(9), &Value::Uint8(1));
        let report = notifier.notify(cid(9), &Value::Uint8(1));
        assert_eq!(report.attempted(), 0);
    }
}
