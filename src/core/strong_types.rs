// Strong Types - newtypes for identifiers that cross component boundaries

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Opaque document id shared by users, posts, events, profiles and locations.
///
/// Ids use the full 64-bit range, past what a JSON double holds exactly, so
/// they travel as decimal strings. Plain numbers are still accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub i64);

impl DocId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DocId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<DocId> for i64 {
    fn from(id: DocId) -> Self {
        id.0
    }
}

impl From<DocId> for serde_json::Value {
    fn from(id: DocId) -> Self {
        serde_json::Value::String(id.to_string())
    }
}

impl Serialize for DocId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct DocIdVisitor;

impl<'de> de::Visitor<'de> for DocIdVisitor {
    type Value = DocId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a document id as a decimal string or integer")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DocId, E> {
        Ok(DocId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DocId, E> {
        i64::try_from(v)
            .map(DocId)
            .map_err(|_| E::custom(format!("id {} is out of range", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DocId, E> {
        v.parse().map_err(|_| E::custom(format!("'{}' is not a valid id", v)))
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DocIdVisitor)
    }
}

impl FromStr for DocId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(DocId)
            .map_err(|_| AppError::BadValues(format!("'{}' is not a valid id", s)))
    }
}

/// Bearer token naming an authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
