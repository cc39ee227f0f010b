//! Keyed-store attribute values and the key metadata derived from them

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Partition key of a stored key: its 16 hex digit key id
pub const FIELD_KEY_ID: &str = "pgpKeyId";

/// Sort key of a stored key: the fingerprint without its trailing key id
pub const FIELD_FINGERPRINT_UPPER: &str = "pgpFingerprintUpper";

pub const FIELD_PRIMARY_USER_ID: &str = "primaryUserId";

/// Tagged value as the keyed store encodes it
///
/// Binary payloads travel as standard base64 strings, as the store encodes
/// them, and stay base64 in the native form. Tags this type does not know are
/// kept verbatim in [`AttributeValue::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "B", with = "base64_bytes")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "BS", with = "base64_bytes_set")]
    Bs(Vec<Vec<u8>>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(untagged)]
    Unknown(Value),
}

impl AttributeValue {
    pub fn s(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    /// Unwrap into the plain JSON shape of the value
    pub fn into_native(self) -> Value {
        match self {
            AttributeValue::B(bytes) => Value::String(STANDARD.encode(bytes)),
            AttributeValue::Bool(b) => Value::Bool(b),
            AttributeValue::Bs(set) => Value::Array(set.into_iter().map(|b| Value::String(STANDARD.encode(b))).collect()),
            AttributeValue::L(list) => Value::Array(list.into_iter().map(AttributeValue::into_native).collect()),
            AttributeValue::M(map) => Value::Object(decode(map)),
            AttributeValue::N(n) => parse_number(n),
            AttributeValue::Ns(set) => Value::Array(set.into_iter().map(parse_number).collect()),
            AttributeValue::Null(_) => Value::Null,
            AttributeValue::S(s) => Value::String(s),
            AttributeValue::Ss(set) => Value::Array(set.into_iter().map(Value::String).collect()),
            AttributeValue::Unknown(value) => value,
        }
    }

    /// String payload, for filters that compare text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }
}

fn parse_number(n: String) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::Number(i.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::String(n))
}

/// A stored record: field name to tagged value
pub type RawAttributeRecord = HashMap<String, AttributeValue>;

/// Unwrap every field of a record
pub fn decode(record: RawAttributeRecord) -> Map<String, Value> {
    record
        .into_iter()
        .map(|(name, value)| (name, value.into_native()))
        .collect()
}

/// Serialized names of the fields `KeyMetadata` derives itself
const DERIVED_FIELDS: [&str; 3] = ["id", "fingerprint", "primaryUserId"];

/// Public metadata of one stored key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    /// 16 hex digit key id
    pub id: String,
    /// Full fingerprint, ending in `id`
    pub fingerprint: String,
    pub primary_user_id: String,
    /// Remaining stored fields, passed through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KeyMetadata {
    /// Derive metadata from a stored record
    ///
    /// # Panics
    ///
    /// If the record lacks a string `pgpKeyId`, `pgpFingerprintUpper` or
    /// `primaryUserId`. That is a schema mismatch with the store, not a
    /// runtime condition.
    pub fn from_record(record: RawAttributeRecord) -> Self {
        let mut fields = decode(record);
        let id = take_string(&mut fields, FIELD_KEY_ID);
        let fingerprint_upper = take_string(&mut fields, FIELD_FINGERPRINT_UPPER);
        let primary_user_id = take_string(&mut fields, FIELD_PRIMARY_USER_ID);
        // Derived names win over stored fields of the same name
        for derived in DERIVED_FIELDS {
            fields.remove(derived);
        }

        Self {
            fingerprint: format!("{}{}", fingerprint_upper, id),
            id,
            primary_user_id,
            extra: fields,
        }
    }

    /// Object-store name of the armored key
    pub fn object_name(&self) -> String {
        format!("{}.asc", self.fingerprint)
    }
}

fn take_string(fields: &mut Map<String, Value>, name: &str) -> String {
    match fields.remove(name) {
        Some(Value::String(s)) => s,
        Some(other) => panic!("store record field `{}` is not a string: {}", name, other),
        None => panic!("store record is missing field `{}`", name),
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_set {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(set: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(set.iter().map(|b| STANDARD.encode(b)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let set = Vec::<String>::deserialize(deserializer)?;
        set.into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
