use crate::{
    Result,
    constants::{ABSOLUTE_MAX_STRING_LENGTH, DEFAULT_MAX_STRING_LENGTH},
    error::Error,
};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::BitOr;

/// Accessory identifier (`aid`), unique per accessory server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessoryId(u64);

impl AccessoryId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instance identifier (`iid`), unique within one accessory.
///
/// Services and characteristics share the same instance id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully qualified characteristic address (`aid.iid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacteristicId {
    pub aid: AccessoryId,
    pub iid: InstanceId,
}

impl CharacteristicId {
    #[must_use]
    pub const fn new(aid: AccessoryId, iid: InstanceId) -> Self {
        Self { aid, iid }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.aid, self.iid)
    }
}

impl std::str::FromStr for CharacteristicId {
    type Err = Error;

    /// Parse the `aid.iid` notation used by HAP `GET /characteristics?id=1.10`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("Invalid characteristic id: {s}"));
        let (aid, iid) = s.split_once('.').ok_or_else(invalid)?;
        let aid: u64 = aid.trim().parse().map_err(|_| invalid())?;
        let iid: u64 = iid.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(AccessoryId::new(aid), InstanceId::new(iid)))
    }
}

/// Identity of a controller session, assigned by the protocol server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a new random session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value format of a characteristic. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int,
    Float,
    String,
}

impl Format {
    /// Whether values of this format are numbers (and accept range constraints).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Format::Bool | Format::String)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Format::Bool => "bool",
            Format::Uint8 => "uint8",
            Format::Uint16 => "uint16",
            Format::Uint32 => "uint32",
            Format::Uint64 => "uint64",
            Format::Int => "int",
            Format::Float => "float",
            Format::String => "string",
        };
        f.write_str(name)
    }
}

/// A typed characteristic value.
///
/// Serialized untagged so the JSON form is the bare HAP value (`true`, `4`,
/// `"GarageDoorOpener-01"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int(i32),
    Float(f64),
    String(String),
}

impl Value {
    /// The format this value carries.
    #[must_use]
    pub fn format(&self) -> Format {
        match self {
            Value::Bool(_) => Format::Bool,
            Value::Uint8(_) => Format::Uint8,
            Value::Uint16(_) => Format::Uint16,
            Value::Uint32(_) => Format::Uint32,
            Value::Uint64(_) => Format::Uint64,
            Value::Int(_) => Format::Int,
            Value::Float(_) => Format::Float,
            Value::String(_) => Format::String,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::Uint8(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used for range checks. `None` for bool and string values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Uint8(v) => Some(f64::from(*v)),
            Value::Uint16(v) => Some(f64::from(*v)),
            Value::Uint32(v) => Some(f64::from(*v)),
            Value::Uint64(v) => Some(*v as f64),
            Value::Int(v) => Some(f64::from(*v)),
            Value::Float(v) => Some(*v),
            Value::Bool(_) | Value::String(_) => None,
        }
    }

    /// Integer view of an integral value; `None` for bool, float and string.
    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Uint8(v) => Some(i128::from(*v)),
            Value::Uint16(v) => Some(i128::from(*v)),
            Value::Uint32(v) => Some(i128::from(*v)),
            Value::Uint64(v) => Some(i128::from(*v)),
            Value::Int(v) => Some(i128::from(*v)),
            Value::Bool(_) | Value::Float(_) | Value::String(_) => None,
        }
    }

    /// Convert this value into `format` when that is lossless.
    ///
    /// Controllers encode numbers without width information, so an incoming
    /// `1` may decode as any integer variant. Integers `0`/`1` are accepted
    /// for bool characteristics, as HAP allows.
    ///
    /// Returns `None` when the value cannot be represented in `format`.
    #[must_use]
    pub fn coerce_to(self, format: Format) -> Option<Value> {
        if self.format() == format {
            return Some(self);
        }

        match format {
            Format::Bool => match self.as_i128()? {
                0 => Some(Value::Bool(false)),
                1 => Some(Value::Bool(true)),
                _ => None,
            },
            Format::Uint8 => u8::try_from(self.as_i128()?).ok().map(Value::Uint8),
            Format::Uint16 => u16::try_from(self.as_i128()?).ok().map(Value::Uint16),
            Format::Uint32 => u32::try_from(self.as_i128()?).ok().map(Value::Uint32),
            Format::Uint64 => u64::try_from(self.as_i128()?).ok().map(Value::Uint64),
            Format::Int => i32::try_from(self.as_i128()?).ok().map(Value::Int),
            Format::Float => self.as_f64().map(Value::Float),
            Format::String => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Uint8(v) => write!(f, "{v}"),
            Value::Uint16(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Uint8(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Access permissions of a characteristic.
///
/// Serialized as the HAP permission list (`["pr", "pw", "ev"]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const READ: Permissions = Permissions(0b001);
    pub const WRITE: Permissions = Permissions(0b010);
    pub const NOTIFY: Permissions = Permissions(0b100);

    #[must_use]
    pub fn contains(&self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn readable(&self) -> bool {
        self.contains(Self::READ)
    }

    #[must_use]
    pub fn writable(&self) -> bool {
        self.contains(Self::WRITE)
    }

    #[must_use]
    pub fn notifiable(&self) -> bool {
        self.contains(Self::NOTIFY)
    }

    /// HAP short names for the granted permissions.
    #[must_use]
    pub fn hap_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.readable() {
            names.push("pr");
        }
        if self.writable() {
            names.push("pw");
        }
        if self.notifiable() {
            names.push("ev");
        }
        names
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permissions(self.0 | rhs.0)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let names = self.hap_names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

/// Value constraints attached to a characteristic.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Constraints {
    #[serde(rename = "minValue", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(rename = "maxValue", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    #[serde(rename = "minStep", skip_serializing_if = "Option::is_none")]
    pub min_step: Option<f64>,

    #[serde(rename = "valid-values", skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<u64>>,

    #[serde(rename = "maxLen", skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

impl Constraints {
    /// No constraints beyond the format itself.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Enumerated values, as used by the door and lock state characteristics.
    #[must_use]
    pub fn enumerated(values: impl IntoIterator<Item = u64>) -> Self {
        let valid: Vec<u64> = values.into_iter().collect();
        Self {
            min_value: valid.iter().min().map(|v| *v as f64),
            max_value: valid.iter().max().map(|v| *v as f64),
            min_step: Some(1.0),
            valid_values: Some(valid),
            ..Self::default()
        }
    }

    /// Inclusive numeric range.
    #[must_use]
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min_value: Some(min),
            max_value: Some(max),
            ..Self::default()
        }
    }

    /// Maximum string length.
    #[must_use]
    pub fn max_len(len: usize) -> Self {
        Self {
            max_len: Some(len),
            ..Self::default()
        }
    }

    /// Check `value` against these constraints.
    ///
    /// # Errors
    /// Returns a human readable reason when the value violates a constraint.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if let Value::String(s) = value {
            let limit = self
                .max_len
                .unwrap_or(DEFAULT_MAX_STRING_LENGTH)
                .min(ABSOLUTE_MAX_STRING_LENGTH);
            let len = s.chars().count();
            if len > limit {
                return Err(format!("string length {len} exceeds {limit}"));
            }
            return Ok(());
        }

        if let Value::Float(v) = value
            && !v.is_finite()
        {
            return Err(format!("{v} is not a finite number"));
        }

        let Some(number) = value.as_f64() else {
            return Ok(());
        };

        if let Some(min) = self.min_value
            && number < min
        {
            return Err(format!("{number} is below minimum {min}"));
        }
        if let Some(max) = self.max_value
            && number > max
        {
            return Err(format!("{number} is above maximum {max}"));
        }
        if let Some(valid) = &self.valid_values {
            let allowed = number >= 0.0
                && number.fract() == 0.0
                && valid.iter().any(|v| *v as f64 == number);
            if !allowed {
                return Err(format!("{number} is not one of {valid:?}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.10", 1, 10)]
    #[case("2.1", 2, 1)]
    #[case(" 3 . 4 ", 3, 4)]
    fn test_characteristic_id_parse(#[case] input: &str, #[case] aid: u64, #[case] iid: u64) {
        let id: CharacteristicId = input.parse().unwrap();
        assert_eq!(id.aid.as_u64(), aid);
        assert_eq!(id.iid.as_u64(), iid);
    }

    #[rstest]
    #[case("110")]
    #[case("a.b")]
    #[case("1.")]
    fn test_characteristic_id_parse_invalid(#[case] input: &str) {
        let result: Result<CharacteristicId> = input.parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_characteristic_id_display() {
        let id = CharacteristicId::new(AccessoryId::new(1), InstanceId::new(9));
        assert_eq!(id.to_string(), "1.9");
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[rstest]
    #[case(Value::Uint64(4), Format::Uint8, Some(Value::Uint8(4)))]
    #[case(Value::Uint64(300), Format::Uint8, None)]
    #[case(Value::Uint8(1), Format::Bool, Some(Value::Bool(true)))]
    #[case(Value::Uint8(0), Format::Bool, Some(Value::Bool(false)))]
    #[case(Value::Uint8(2), Format::Bool, None)]
    #[case(Value::Int(-1), Format::Uint8, None)]
    #[case(Value::Uint8(7), Format::Float, Some(Value::Float(7.0)))]
    #[case(Value::Float(1.0), Format::Uint8, None)]
    #[case(Value::Bool(true), Format::Uint8, None)]
    #[case(Value::Uint8(1), Format::String, None)]
    fn test_value_coercion(
        #[case] value: Value,
        #[case] format: Format,
        #[case] expected: Option<Value>,
    ) {
        assert_eq!(value.coerce_to(format), expected);
    }

    #[test]
    fn test_value_serializes_as_bare_json() {
        assert_eq!(serde_json::to_string(&Value::Uint8(4)).unwrap(), "4");
        assert_eq!(serde_json::to_string(&Value::Bool(false)).unwrap(), "false");
        assert_eq!(
            serde_json::to_string(&Value::from("GarageDoorOpener-01")).unwrap(),
            "\"GarageDoorOpener-01\""
        );
    }

    #[test]
    fn test_value_deserializes_smallest_integer() {
        let value: Value = serde_json::from_str("1").unwrap();
        assert_eq!(value, Value::Uint8(1));
        let value: Value = serde_json::from_str("-3").unwrap();
        assert_eq!(value, Value::Int(-3));
    }

    #[test]
    fn test_permissions_bits() {
        let perms = Permissions::READ | Permissions::NOTIFY;
        assert!(perms.readable());
        assert!(!perms.writable());
        assert!(perms.notifiable());
        assert_eq!(perms.hap_names(), vec!["pr", "ev"]);
        assert_eq!(serde_json::to_string(&perms).unwrap(), "[\"pr\",\"ev\"]");
    }

    #[rstest]
    #[case(Value::Uint8(0), true)]
    #[case(Value::Uint8(4), true)]
    #[case(Value::Uint8(5), false)]
    fn test_enumerated_constraints(#[case] value: Value, #[case] ok: bool) {
        let constraints = Constraints::enumerated(0..=4);
        assert_eq!(constraints.check(&value).is_ok(), ok);
    }

    #[test]
    fn test_enumerated_constraints_reject_gaps() {
        let constraints = Constraints::enumerated([0, 2]);
        assert!(constraints.check(&Value::Uint8(1)).is_err());
    }

    #[test]
    fn test_range_constraints() {
        let constraints = Constraints::range(-10.0, 10.0);
        assert!(constraints.check(&Value::Int(-10)).is_ok());
        assert!(constraints.check(&Value::Int(11)).is_err());
        assert!(constraints.check(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_string_length_defaults_to_64() {
        let constraints = Constraints::none();
        assert!(constraints.check(&Value::from("a".repeat(64))).is_ok());
        assert!(constraints.check(&Value::from("a".repeat(65))).is_err());
    }

    #[test]
    fn test_constraints_serialize_hap_names() {
        let json = serde_json::to_value(Constraints::enumerated([0, 1])).unwrap();
        assert_eq!(json["minValue"], 0.0);
        assert_eq!(json["maxValue"], 1.0);
        assert_eq!(json["valid-values"], serde_json::json!([0, 1]));
        assert!(json.get("maxLen").is_none());
    }
}
