//! Characteristic value cell.
//!
//! A [`Characteristic`] couples a typed value with its format contract
//! (format, permissions, constraints) and optional read/write hooks. Every
//! mutation of the value happens inside one critical section guarded by the
//! cell's mutex: validation has already happened, the write hook runs, the
//! value is committed and the change observer is informed, all before the
//! lock is released. Nothing inside the critical section awaits.

use garage_core::{
    CharacteristicId, CharacteristicType, Constraints, Error, Format, Permissions, Result, Value,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, trace};

/// Hook invoked before a read. Returning `Some` refreshes the stored value.
pub type ReadHook = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Hook invoked with `(current, proposed)` before a write commits.
/// Returning `Err(reason)` vetoes the write.
pub type WriteHook = Arc<dyn Fn(&Value, &Value) -> std::result::Result<(), String> + Send + Sync>;

/// Receives every committed value change of a notifiable characteristic.
///
/// Called while the characteristic's lock is held, so implementations must
/// not block and must not touch the same characteristic again.
pub trait ChangeObserver: Send + Sync {
    fn value_changed(&self, id: CharacteristicId, value: &Value);
}

/// Typed value cell with format, permissions, constraints and hooks.
pub struct Characteristic {
    id: CharacteristicId,
    kind: CharacteristicType,
    format: Format,
    permissions: Permissions,
    constraints: Constraints,
    value: Mutex<Value>,
    on_read: Option<ReadHook>,
    on_write: Option<WriteHook>,
    observer: OnceLock<Arc<dyn ChangeObserver>>,
}

impl Characteristic {
    /// Start describing a characteristic of the given HAP type.
    #[must_use]
    pub fn builder(kind: CharacteristicType) -> CharacteristicBuilder {
        CharacteristicBuilder::new(kind)
    }

    pub fn id(&self) -> CharacteristicId {
        self.id
    }

    pub fn kind(&self) -> CharacteristicType {
        self.kind
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Read the value as a controller would.
    ///
    /// # Errors
    /// `NotReadable` if the characteristic lacks the read permission, or
    /// `InvalidValue` if the read hook produced a value outside the contract.
    pub fn read(&self) -> Result<Value> {
        if !self.permissions.readable() {
            return Err(Error::NotReadable(self.id));
        }

        let mut value = self.lock();
        if let Some(hook) = &self.on_read
            && let Some(fresh) = hook(&value)
        {
            let fresh = self.validate(fresh)?;
            if *value != fresh {
                *value = fresh;
                self.emit(&value);
            }
        }
        Ok(value.clone())
    }

    /// Write the value as a controller would.
    ///
    /// A successful write informs the change observer exactly once, even when
    /// the new value equals the old one.
    ///
    /// # Errors
    /// `NotWritable`, `InvalidValue` or `RejectedByHandler`. A failed write
    /// leaves the stored value unchanged.
    pub fn write(&self, value: Value) -> Result<()> {
        if !self.permissions.writable() {
            return Err(Error::NotWritable(self.id));
        }
        let value = self.validate(value)?;

        let mut current = self.lock();
        if let Some(hook) = &self.on_write {
            hook(&current, &value).map_err(|reason| {
                debug!(id = %self.id, %reason, "Write rejected by handler");
                Error::rejected(self.id, reason)
            })?;
        }
        trace!(id = %self.id, new = %value, "Committing write");
        *current = value;
        self.emit(&current);
        Ok(())
    }

    /// Internal update path used by the accessory itself.
    ///
    /// Skips permission checks and hooks but still enforces format and
    /// constraints. Returns `true` (and informs the observer) only when the
    /// stored value actually changed.
    ///
    /// # Errors
    /// `InvalidValue` if the value violates the format contract.
    pub fn update(&self, value: impl Into<Value>) -> Result<bool> {
        let value = self.validate(value.into())?;

        let mut current = self.lock();
        if *current == value {
            return Ok(false);
        }
        *current = value;
        self.emit(&current);
        Ok(true)
    }

    /// Stored value, bypassing permissions and hooks.
    pub fn value(&self) -> Value {
        self.lock().clone()
    }

    /// Attach the change observer. Only the first attachment takes effect.
    pub fn attach_observer(&self, observer: Arc<dyn ChangeObserver>) -> bool {
        self.observer.set(observer).is_ok()
    }

    fn validate(&self, value: Value) -> Result<Value> {
        let supplied = value.format();
        let value = value.coerce_to(self.format).ok_or_else(|| {
            Error::invalid_value(
                self.id,
                format!("expected {}, got {supplied}", self.format),
            )
        })?;
        self.constraints
            .check(&value)
            .map_err(|reason| Error::invalid_value(self.id, reason))?;
        Ok(value)
    }

    fn emit(&self, value: &Value) {
        if !self.permissions.notifiable() {
            return;
        }
        if let Some(observer) = self.observer.get() {
            observer.value_changed(self.id, value);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("permissions", &self.permissions)
            .field("value", &self.value())
            .finish_non_exhaustive()
    }
}

/// Declarative description of a characteristic, turned into a
/// [`Characteristic`] once the accessory assigns it an instance id.
#[derive(Clone)]
pub struct CharacteristicBuilder {
    kind: CharacteristicType,
    format: Format,
    permissions: Permissions,
    constraints: Constraints,
    initial: Option<Value>,
    on_read: Option<ReadHook>,
    on_write: Option<WriteHook>,
}

impl CharacteristicBuilder {
    /// Defaults for format, permissions and constraints come from the HAP
    /// definition of `kind`.
    #[must_use]
    pub fn new(kind: CharacteristicType) -> Self {
        Self {
            kind,
            format: kind.format(),
            permissions: kind.permissions(),
            constraints: kind.constraints(),
            initial: None,
            on_read: None,
            on_write: None,
        }
    }

    pub fn kind(&self) -> CharacteristicType {
        self.kind
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn on_read<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.on_read = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_write<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.on_write = Some(Arc::new(hook));
        self
    }

    /// Build the characteristic with its final id.
    ///
    /// # Errors
    /// `InvalidValue` if the initial value violates the format contract.
    pub fn build(self, id: CharacteristicId) -> Result<Characteristic> {
        let initial = self.initial.unwrap_or_else(|| default_value(self.format));
        let supplied = initial.format();
        let initial = initial.coerce_to(self.format).ok_or_else(|| {
            Error::invalid_value(id, format!("expected {}, got {supplied}", self.format))
        })?;
        self.constraints
            .check(&initial)
            .map_err(|reason| Error::invalid_value(id, reason))?;

        Ok(Characteristic {
            id,
            kind: self.kind,
            format: self.format,
            permissions: self.permissions,
            constraints: self.constraints,
            value: Mutex::new(initial),
            on_read: self.on_read,
            on_write: self.on_write,
            observer: OnceLock::new(),
        })
    }
}

/// Zero value of a format, used when no initial value is configured.
fn default_value(format: Format) -> Value {
    match format {
        Format::Bool => Value::Bool(false),
        Format::Uint8 => Value::Uint8(0),
        Format::Uint16 => Value::Uint16(0),
        Format::Uint32 => Value::Uint32(0),
        Format::Uint64 => Value::Uint64(0),
        Format::Int => Value::Int(0),
        Format::Float => Value::Float(0.0),
        Format::String => Value::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_core::{AccessoryId, InstanceId};
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cid(iid: u64) -> CharacteristicId {
        CharacteristicId::new(AccessoryId::new(1), InstanceId::new(iid))
    }

    #[derive(Default)]
    struct CountingObserver {
        calls: AtomicUsize,
        last: Mutex<Option<Value>>,
    }

    impl ChangeObserver for CountingObserver {
        fn value_changed(&self, _id: CharacteristicId, value: &Value) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(value.clone());
        }
    }

    fn target_door() -> Characteristic {
        Characteristic::builder(CharacteristicType::TargetDoorState)
            .value(1u8)
            .build(cid(11))
            .unwrap()
    }

    #[test]
    fn test_write_then_read_returns_written_value() {
        let characteristic = target_door();
        characteristic.write(Value::Uint8(0)).unwrap();
        assert_eq!(characteristic.read().unwrap(), Value::Uint8(0));
    }

    #[rstest]
    #[case(Value::Uint8(2))]
    #[case(Value::Uint64(300))]
    #[case(Value::from("open"))]
    #[case(Value::Float(0.5))]
    fn test_invalid_write_leaves_value_unchanged(#[case] value: Value) {
        let characteristic = target_door();
        let err = characteristic.write(value).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(characteristic.value(), Value::Uint8(1));
    }

    #[test]
    fn test_wide_integer_is_coerced() {
        let characteristic = target_door();
        characteristic.write(Value::Uint64(0)).unwrap();
        assert_eq!(characteristic.value(), Value::Uint8(0));
    }

    #[test]
    fn test_read_only_rejects_write() {
        let characteristic = Characteristic::builder(CharacteristicType::CurrentDoorState)
            .value(4u8)
            .build(cid(10))
            .unwrap();
        assert_eq!(
            characteristic.write(Value::Uint8(1)),
            Err(Error::NotWritable(cid(10)))
        );
    }

    #[test]
    fn test_write_only_rejects_read() {
        let identify = Characteristic::builder(CharacteristicType::Identify)
            .build(cid(7))
            .unwrap();
        assert_eq!(identify.read(), Err(Error::NotReadable(cid(7))));
        identify.write(Value::Bool(true)).unwrap();
    }

    #[test]
    fn test_write_hook_can_veto() {
        let characteristic = Characteristic::builder(CharacteristicType::LockTargetState)
            .on_write(|_, _| Err("lock service offline".to_string()))
            .build(cid(14))
            .unwrap();

        let err = characteristic.write(Value::Uint8(1)).unwrap_err();
        assert!(matches!(err, Error::RejectedByHandler { .. }));
        assert_eq!(characteristic.value(), Value::Uint8(0));
    }

    #[test]
    fn test_write_hook_sees_current_and_proposed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let characteristic = Characteristic::builder(CharacteristicType::TargetDoorState)
            .value(1u8)
            .on_write(move |old, new| {
                log.lock().unwrap().push((old.clone(), new.clone()));
                Ok(())
            })
            .build(cid(11))
            .unwrap();

        characteristic.write(Value::Uint8(0)).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Value::Uint8(1), Value::Uint8(0))]
        );
    }

    #[test]
    fn test_read_hook_refreshes_value() {
        let characteristic = Characteristic::builder(CharacteristicType::ObstructionDetected)
            .on_read(|_| Some(Value::Bool(true)))
            .build(cid(12))
            .unwrap();
        assert_eq!(characteristic.read().unwrap(), Value::Bool(true));
        assert_eq!(characteristic.value(), Value::Bool(true));
    }

    #[test]
    fn test_read_hook_invalid_value_is_rejected() {
        let characteristic = Characteristic::builder(CharacteristicType::CurrentDoorState)
            .value(4u8)
            .on_read(|_| Some(Value::Uint8(9)))
            .build(cid(10))
            .unwrap();
        assert!(characteristic.read().is_err());
        assert_eq!(characteristic.value(), Value::Uint8(4));
    }

    #[test]
    fn test_every_accepted_write_notifies_once() {
        let characteristic = target_door();
        let observer = Arc::new(CountingObserver::default());
        assert!(characteristic.attach_observer(observer.clone()));

        characteristic.write(Value::Uint8(1)).unwrap();
        characteristic.write(Value::Uint8(0)).unwrap();
        let _ = characteristic.write(Value::Uint8(7));

        assert_eq!(observer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*observer.last.lock().unwrap(), Some(Value::Uint8(0)));
    }

    #[test]
    fn test_update_notifies_only_on_change() {
        let characteristic = Characteristic::builder(CharacteristicType::CurrentDoorState)
            .value(4u8)
            .build(cid(10))
            .unwrap();
        let observer = Arc::new(CountingObserver::default());
        characteristic.attach_observer(observer.clone());

        assert!(!characteristic.update(4u8).unwrap());
        assert!(characteristic.update(3u8).unwrap());
        assert!(characteristic.update(Value::Uint8(5)).is_err());
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_notifiable_never_notifies() {
        let name = Characteristic::builder(CharacteristicType::Name)
            .value("Garage")
            .build(cid(2))
            .unwrap();
        let observer = Arc::new(CountingObserver::default());
        name.attach_observer(observer.clone());
        name.update("Barn").unwrap();
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_observer_attaches_once() {
        let characteristic = target_door();
        assert!(characteristic.attach_observer(Arc::new(CountingObserver::default())));
        assert!(!characteristic.attach_observer(Arc::new(CountingObserver::default())));
    }

    #[test]
    fn test_initial_value_is_validated() {
        let result = Characteristic::builder(CharacteristicType::Name)
            .value("x".repeat(65))
            .build(cid(2));
        assert!(result.is_err());
    }
}
