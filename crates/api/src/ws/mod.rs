//! WebSocket endpoint for live analysis updates.
//!
//! Each connection holds one hub subscription for the analysis named in
//! the path and is kept alive with periodic pings.

mod handler;
mod heartbeat;

pub use handler::ws_handler;
pub use heartbeat::HEARTBEAT_INTERVAL;
