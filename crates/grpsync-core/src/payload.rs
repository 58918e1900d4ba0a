//! The typed extension payload carried on metadata rows and sync entities.
//!
//! Persisted as the `ExtraParameters` JSON column of a metadata row. This is
//! the single serialization boundary for that JSON: nothing else in the
//! engine parses it ad hoc.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::ContentHash;

/// Current payload schema version.
pub const PAYLOAD_VERSION: u32 = 1;

/// Denormalized per-item state remembered between passes.
///
/// JSON keys match the persisted contract:
/// `{ContentHash, RemoteId, PriorStatus, PriorDueDate, IsPrivate, Title, Slot}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionPayload {
    #[serde(rename = "Version")]
    pub version: u32,

    /// Content hash of the aggregate at the last successful pass.
    #[serde(rename = "ContentHash", skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,

    /// Remote identity in canonical string form.
    #[serde(rename = "RemoteId", skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    /// Status the item carried when last synced.
    #[serde(rename = "PriorStatus", skip_serializing_if = "Option::is_none")]
    pub prior_status: Option<String>,

    /// Due/end date the item carried when last synced.
    #[serde(rename = "PriorDueDate", skip_serializing_if = "Option::is_none")]
    pub prior_due_date: Option<NaiveDate>,

    /// Privacy flag of the remote item.
    #[serde(rename = "IsPrivate", skip_serializing_if = "std::ops::Not::not")]
    pub is_private: bool,

    /// Denormalized title, for logging and duplicate checks.
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Slot marker for child records reconciled against fixed remote slots.
    #[serde(rename = "Slot", skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl ExtensionPayload {
    pub fn new() -> Self {
        Self {
            version: PAYLOAD_VERSION,
            ..Default::default()
        }
    }

    /// Payload for a slot-marked child record.
    pub fn for_slot(slot: impl Into<String>) -> Self {
        Self {
            slot: Some(slot.into()),
            ..Self::new()
        }
    }

    /// Decode from the persisted JSON column. Empty input decodes to default.
    pub fn decode(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Encode for the persisted JSON column.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
