//! Shared message types for the nutconf configuration agent.
//!
//! The transport itself (message bus connection, framing, decoding) is an
//! external collaborator; these types describe the already-decoded records
//! the engine consumes and the replies/publications it produces.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for correlation
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Subject published when an asset gains a usable driver configuration
pub const SUBJECT_ADD_CONFIG: &str = "addConfig";

/// Subject published when an asset loses its driver configuration
pub const SUBJECT_REMOVE_CONFIG: &str = "removeConfig";

/// Request subject for an ad-hoc asset rescan
pub const SUBJECT_RESCAN_ASSET: &str = "rescanAsset";

/// Asset subtypes handled by the configuration agent
const POWER_DEVICE_SUBTYPES: &[&str] = &["ups", "pdu", "epdu", "sts"];

/// Generate a unique request ID for correlation
pub fn generate_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Lifecycle operation carried by an asset notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOperation {
    Create,
    Update,
    Delete,
}

/// Administrative status of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Active,
    Nonactive,
}

/// An asset lifecycle notification, already decoded from the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEvent {
    /// Asset name, unique across the monitored fleet
    pub name: String,
    /// Asset type ("device" for everything this agent cares about)
    pub kind: String,
    /// Device subtype (ups, pdu, epdu, sts, ...)
    pub subtype: String,
    pub operation: AssetOperation,
    pub status: AssetStatus,
}

impl AssetEvent {
    /// Whether this event concerns a power device this agent manages
    pub fn is_power_device(&self) -> bool {
        self.kind == "device" && POWER_DEVICE_SUBTYPES.contains(&self.subtype.as_str())
    }
}

/// A credential-store change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEvent {
    pub credential_id: String,
}

/// A synchronous request received over the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub subject: String,
    pub correlation_id: String,
    pub reply_to: String,
    #[serde(default)]
    pub payload: Vec<String>,
}

impl RequestEnvelope {
    /// Validate the metadata required to process and answer a request.
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.subject.is_empty() {
            return Err("subject");
        }
        if self.correlation_id.is_empty() {
            return Err("correlation_id");
        }
        if self.reply_to.is_empty() {
            return Err("reply_to");
        }
        Ok(())
    }
}

/// Outcome carried by a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Ko,
}

/// Reply to a [`RequestEnvelope`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub subject: String,
    pub correlation_id: String,
    /// Address the reply is routed to (the request's reply_to)
    pub to: String,
    pub status: ReplyStatus,
    #[serde(default)]
    pub payload: Vec<String>,
}

impl Reply {
    /// Build a reply addressed back to the sender of `request`
    pub fn to_request(request: &RequestEnvelope, status: ReplyStatus, payload: Vec<String>) -> Self {
        Self {
            subject: request.subject.clone(),
            correlation_id: request.correlation_id.clone(),
            to: request.reply_to.clone(),
            status,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: &str, subtype: &str) -> AssetEvent {
        AssetEvent {
            name: "ups-1".to_string(),
            kind: kind.to_string(),
            subtype: subtype.to_string(),
            operation: AssetOperation::Create,
            status: AssetStatus::Active,
        }
    }

    #[test]
    fn test_power_device_filter() {
        assert!(event("device", "ups").is_power_device());
        assert!(event("device", "epdu").is_power_device());
        assert!(!event("device", "server").is_power_device());
        assert!(!event("room", "ups").is_power_device());
    }

    #[test]
    fn test_asset_event_json_round_trip() {
        let ev = event("device", "pdu");
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"create\""));
        assert!(json.contains("\"active\""));
        let back: AssetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "ups-1");
        assert_eq!(back.operation, AssetOperation::Create);
        assert_eq!(back.status, AssetStatus::Active);
    }

    #[test]
    fn test_request_validation() {
        let mut req = RequestEnvelope {
            subject: SUBJECT_RESCAN_ASSET.to_string(),
            correlation_id: "42".to_string(),
            reply_to: "client-1".to_string(),
            payload: vec!["ups-1".to_string()],
        };
        assert!(req.validate().is_ok());

        req.correlation_id.clear();
        assert_eq!(req.validate(), Err("correlation_id"));
    }

    #[test]
    fn test_reply_addressing() {
        let req = RequestEnvelope {
            subject: SUBJECT_RESCAN_ASSET.to_string(),
            correlation_id: "7".to_string(),
            reply_to: "client-9".to_string(),
            payload: Vec::new(),
        };
        let reply = Reply::to_request(&req, ReplyStatus::Ok, vec!["ups-1".to_string()]);
        assert_eq!(reply.to, "client-9");
        assert_eq!(reply.correlation_id, "7");
        assert_eq!(reply.status, ReplyStatus::Ok);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert_ne!(a, b);
    }
}
