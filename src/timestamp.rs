use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// A Unix timestamp represented as a `u64`, used for token expiry claims.
///
/// This type encodes the number of seconds since the Unix epoch
/// (1970-01-01T00:00:00Z). Authorization servers emit expiry either as a JSON
/// integer (the RFC 7662 shape) or as a stringified integer, so
/// deserialization accepts both. Serialization always produces a stringified
/// integer to avoid loss of precision in JSON.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(now)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = UnixTimestamp;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                formatter.write_str("a Unix timestamp in seconds")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(UnixTimestamp(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .map(UnixTimestamp)
                    .map_err(|_| E::custom("timestamp must be non-negative"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value
                    .parse::<u64>()
                    .map(UnixTimestamp)
                    .map_err(|_| E::custom("timestamp must be a non-negative integer"))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_integer() {
        let ts: UnixTimestamp = serde_json::from_str("1699999999").unwrap();
        assert_eq!(ts.as_secs(), 1699999999);
    }

    #[test]
    fn test_deserialize_string() {
        let ts: UnixTimestamp = serde_json::from_str("\"1699999999\"").unwrap();
        assert_eq!(ts.as_secs(), 1699999999);
    }

    #[test]
    fn test_deserialize_negative_rejected() {
        let result: Result<UnixTimestamp, _> = serde_json::from_str("-5");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_as_string() {
        let ts = UnixTimestamp::from_secs(42);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"42\"");
    }
}
