//! Live analysis update fan-out.
//!
//! - [`NotificationHub`]: per-analysis subscriber registry that broadcasts
//!   [`HubEvent`]s to every live subscriber and prunes dead ones.
//! - [`HubEvent`]: the wire envelope sent to WebSocket clients.

pub mod hub;
pub mod message;

pub use hub::{HubConfig, NotificationHub, Subscription, SubscriptionHandle};
pub use message::HubEvent;
