//! JSON-RPC request classification.
//!
//! [`RpcClassifier`] decides which HTTP requests carry JSON-RPC calls the
//! resource should meter: `POST` at the mount path (or its `/message`
//! sub-path) with an object or batch-array body. Everything else, including
//! notifications without an `id`, classifies to no calls, so transport
//! traffic such as SSE polling or health checks passes through unmetered.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::config::{self, Config};

/// The JSON-RPC protocol version marker. Always the string `"2.0"`;
/// anything else fails deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct JsonRpcVersion;

impl JsonRpcVersion {
    pub const TEXT: &'static str = "2.0";
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::TEXT)
    }
}

impl Serialize for JsonRpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::TEXT)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VersionVisitor;
        impl Visitor<'_> for VersionVisitor {
            type Value = JsonRpcVersion;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "the string \"{}\"", JsonRpcVersion::TEXT)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                if value == JsonRpcVersion::TEXT {
                    Ok(JsonRpcVersion)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(value), &self))
                }
            }
        }
        deserializer.deserialize_str(VersionVisitor)
    }
}

/// A JSON-RPC request id: number, string, or explicit `null`.
///
/// A missing id marks a notification, which is not an [`RpcCall`] at all;
/// an explicit `null` id is a (degenerate but valid) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Text(String),
    Null,
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcId::Number(value) => write!(f, "{value}"),
            RpcId::Text(value) => f.write_str(value),
            RpcId::Null => f.write_str("null"),
        }
    }
}

/// One JSON-RPC call extracted from a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcCall {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Classifies HTTP requests into the JSON-RPC calls they carry.
#[derive(Debug, Clone)]
pub struct RpcClassifier {
    mount_path: String,
}

impl RpcClassifier {
    /// Creates a classifier for a mount path. The path is normalized the
    /// same way [`Config`] normalizes it, so `"mcp/"` and `"/mcp"` agree.
    pub fn new(mount_path: &str) -> Self {
        Self {
            mount_path: config::normalize_mount_path(mount_path),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.mount_path())
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Extracts the JSON-RPC calls a request carries, in body order.
    ///
    /// Non-`POST` methods, paths other than the mount path or its
    /// `/message` sub-path, and bodies that are not a JSON object or array
    /// yield no calls. Within a batch, elements that are not well-formed
    /// calls (wrong version, missing method or id) are dropped while the
    /// rest keep their order.
    pub fn classify(
        &self,
        method: &http::Method,
        uri: &http::Uri,
        body: Option<&serde_json::Value>,
    ) -> Vec<RpcCall> {
        if method != http::Method::POST {
            return Vec::new();
        }
        if !self.matches_path(uri.path()) {
            return Vec::new();
        }
        match body {
            Some(value @ serde_json::Value::Object(_)) => serde_json::from_value(value.clone())
                .ok()
                .into_iter()
                .collect(),
            Some(serde_json::Value::Array(elements)) => elements
                .iter()
                .filter_map(|el| serde_json::from_value(el.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn matches_path(&self, path: &str) -> bool {
        let path = {
            let trimmed = path.trim_end_matches('/');
            if trimmed.is_empty() { "/" } else { trimmed }
        };
        if path == self.mount_path {
            return true;
        }
        let message_path = if self.mount_path == "/" {
            "/message".to_string()
        } else {
            format!("{}/message", self.mount_path)
        };
        path == message_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> RpcClassifier {
        RpcClassifier::new("/mcp")
    }

    fn uri(path: &str) -> http::Uri {
        path.parse().unwrap()
    }

    fn post() -> http::Method {
        http::Method::POST
    }

    #[test]
    fn test_single_call() {
        let body = json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 1 });
        let calls = classifier().classify(&post(), &uri("/mcp"), Some(&body));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "tools/call");
        assert_eq!(calls[0].id, RpcId::Number(1));
        assert_eq!(calls[0].params, None);
    }

    #[test]
    fn test_params_are_preserved() {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": "a",
            "params": { "name": "search" },
        });
        let calls = classifier().classify(&post(), &uri("/mcp"), Some(&body));
        assert_eq!(calls[0].params, Some(json!({ "name": "search" })));
    }

    #[test]
    fn test_non_post_is_not_classified() {
        let body = json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 1 });
        let calls = classifier().classify(&http::Method::GET, &uri("/mcp"), Some(&body));
        assert!(calls.is_empty());
    }

    #[test]
    fn test_wrong_path_is_not_classified() {
        let body = json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 1 });
        let calls = classifier().classify(&post(), &uri("/health"), Some(&body));
        assert!(calls.is_empty());
    }

    #[test]
    fn test_message_subpath_is_classified() {
        let body = json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 1 });
        let calls = classifier().classify(&post(), &uri("/mcp/message"), Some(&body));
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_trailing_slash_is_tolerated() {
        let body = json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 1 });
        let calls = classifier().classify(&post(), &uri("/mcp/"), Some(&body));
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_root_mount_accepts_root_and_message() {
        let classifier = RpcClassifier::new("/");
        let body = json!({ "jsonrpc": "2.0", "method": "ping", "id": 1 });
        assert_eq!(
            classifier.classify(&post(), &uri("/"), Some(&body)).len(),
            1
        );
        assert_eq!(
            classifier
                .classify(&post(), &uri("/message"), Some(&body))
                .len(),
            1
        );
        assert!(
            classifier
                .classify(&post(), &uri("/other"), Some(&body))
                .is_empty()
        );
    }

    #[test]
    fn test_missing_body_is_not_classified() {
        assert!(classifier().classify(&post(), &uri("/mcp"), None).is_empty());
    }

    #[test]
    fn test_scalar_body_is_not_classified() {
        let body = json!("ping");
        assert!(
            classifier()
                .classify(&post(), &uri("/mcp"), Some(&body))
                .is_empty()
        );
    }

    #[test]
    fn test_notification_without_id_is_dropped() {
        let body = json!({ "jsonrpc": "2.0", "method": "notifications/progress" });
        assert!(
            classifier()
                .classify(&post(), &uri("/mcp"), Some(&body))
                .is_empty()
        );
    }

    #[test]
    fn test_explicit_null_id_is_kept() {
        let body = json!({ "jsonrpc": "2.0", "method": "tools/call", "id": null });
        let calls = classifier().classify(&post(), &uri("/mcp"), Some(&body));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, RpcId::Null);
    }

    #[test]
    fn test_wrong_version_is_dropped() {
        let body = json!({ "jsonrpc": "1.0", "method": "tools/call", "id": 1 });
        assert!(
            classifier()
                .classify(&post(), &uri("/mcp"), Some(&body))
                .is_empty()
        );
    }

    #[test]
    fn test_batch_keeps_order_and_drops_malformed() {
        let body = json!([
            { "jsonrpc": "2.0", "method": "first", "id": 1 },
            { "jsonrpc": "2.0", "method": "notify" },
            "not an object",
            { "jsonrpc": "2.0", "method": "second", "id": "two" },
            { "jsonrpc": "1.0", "method": "wrong", "id": 3 },
        ]);
        let calls = classifier().classify(&post(), &uri("/mcp"), Some(&body));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "first");
        assert_eq!(calls[1].method, "second");
        assert_eq!(calls[1].id, RpcId::Text("two".to_string()));
    }

    #[test]
    fn test_mount_path_normalization() {
        assert_eq!(RpcClassifier::new("mcp/").mount_path(), "/mcp");
        assert_eq!(RpcClassifier::new("").mount_path(), "/");
    }

    #[test]
    fn test_rpc_call_round_trips() {
        let call = RpcCall {
            jsonrpc: JsonRpcVersion,
            method: "tools/call".to_string(),
            id: RpcId::Number(7),
            params: None,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json, json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 7 }));
    }
}
