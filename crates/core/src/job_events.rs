//! Message type constants for live analysis updates.
//!
//! Used by the notification hub when serializing events for WebSocket
//! subscribers.

/// Sent once to every new subscriber, before any pipeline update.
pub const MSG_TYPE_CONNECTION_STATUS: &str = "connection_status";

/// Sent on every pipeline transition of an analysis.
pub const MSG_TYPE_ANALYSIS_UPDATE: &str = "analysis_update";

/// Status value carried by the `connection_status` event.
pub const CONNECTION_STATUS_CONNECTED: &str = "connected";
