//! The cold-tier document schema (spec.md §4.4 "Document schema").

use authvault_types::envelope::EncryptedEnvelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{ _id: sessionId, version, updatedAt, creds, keys, appState? }`.
/// Unlike the hot tier's packed "keys" slot, `appState` gets its own field
/// here — a single document has room for it without stretching the
/// three-key layout the hot tier is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdDocument {
    #[serde(rename = "_id")]
    pub session_id: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub creds: EncryptedEnvelope,
    pub keys: EncryptedEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_state: Option<EncryptedEnvelope>,
}
