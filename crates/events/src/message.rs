//! Events delivered to analysis subscribers.

use researcher_core::analysis::{Analysis, AnalysisStatus};
use researcher_core::job_events::{
    CONNECTION_STATUS_CONNECTED, MSG_TYPE_ANALYSIS_UPDATE, MSG_TYPE_CONNECTION_STATUS,
};
use researcher_core::types::{DbId, Timestamp};
use serde::Serialize;

/// An event pushed to subscribers of one analysis.
///
/// Serialized with a `type` tag:
///
/// ```json
/// {"type": "connection_status", "job_id": 42, "status": "connected"}
/// {"type": "analysis_update", "job_id": 42, "status": "researching", "progress": 0.25}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    /// First event of every subscription.
    ConnectionStatus { job_id: DbId, status: &'static str },

    /// A pipeline transition.
    AnalysisUpdate {
        job_id: DbId,
        status: AnalysisStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: Timestamp,
    },
}

impl HubEvent {
    pub fn connected(job_id: DbId) -> Self {
        Self::ConnectionStatus {
            job_id,
            status: CONNECTION_STATUS_CONNECTED,
        }
    }

    /// Snapshot of `analysis` after a transition.
    pub fn update(analysis: &Analysis) -> Self {
        Self::AnalysisUpdate {
            job_id: analysis.id,
            status: analysis.status,
            progress: Some(analysis.progress),
            error: analysis.error_message().map(str::to_string),
            timestamp: analysis.updated_at,
        }
    }

    pub fn job_id(&self) -> DbId {
        match self {
            Self::ConnectionStatus { job_id, .. } | Self::AnalysisUpdate { job_id, .. } => *job_id,
        }
    }

    /// The `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionStatus { .. } => MSG_TYPE_CONNECTION_STATUS,
            Self::AnalysisUpdate { .. } => MSG_TYPE_ANALYSIS_UPDATE,
        }
    }

    /// JSON text for a WebSocket frame.
    pub fn to_json(&self) -> String {
        // Serialization of this enum cannot fail: every field is a plain value.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
