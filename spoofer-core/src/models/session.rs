use serde::{Deserialize, Serialize};
use std::fmt;

/// Value the API reports for a spoof test when the spoofed test packet arrived.
pub const SPOOF_RECEIVED: &str = "received";

/// A scalar field of a session record. The API mixes strings and numbers
/// (`asn4` and `session` are integers, the spoof results are strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// One client measurement as reported under `hydra:member`.
///
/// Every field is optional; JSON `null` and a missing key both map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn4: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client4: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privatespoof: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routedspoof: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<FieldValue>,
}

impl SessionRecord {
    /// True when the session reported a non-empty IPv4 client address.
    pub fn has_ipv4_client(&self) -> bool {
        self.client4.as_ref().is_some_and(|v| !v.is_empty())
    }

    pub fn routed_spoof_received(&self) -> bool {
        is_received(self.routedspoof.as_ref())
    }

    pub fn private_spoof_received(&self) -> bool {
        is_received(self.privatespoof.as_ref())
    }
}

fn is_received(value: Option<&FieldValue>) -> bool {
    value.and_then(FieldValue::as_str) == Some(SPOOF_RECEIVED)
}
