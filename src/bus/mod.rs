//! Messaging between monitors and the panel.
//!
//! Monitors publish [`Message::DataUpdate`] and [`Message::ThresholdBreach`]
//! through a [`Bus`]. Control requests travel the other way through the
//! [`ControlRouter`], which answers each with a [`Response`].
//!
//! ```text
//! Monitor ──publish──▶ Bus (ChannelBus) ──▶ panel
//!    ▲                                         │
//!    └──── MonitorHandle ◀── ControlRouter ◀───┘
//! ```

pub mod background;
pub mod channel;
pub mod message;
pub mod registry;
pub mod router;

pub use background::{Background, WindowId};
pub use channel::{ChannelBus, Envelope};
pub use message::{BreachRecord, Message, Response};
pub use registry::OwnershipRegistry;
pub use router::ControlRouter;

use std::fmt::Debug;

use crate::error::CommsError;
use crate::store::TabId;

/// Outbound side of the messaging layer.
///
/// Publishing must not block. A failed publish is not fatal; the monitor
/// writes the payload to storage instead.
pub trait Bus: Send + Sync + Debug {
    fn publish(&self, tab: TabId, message: Message) -> Result<(), CommsError>;
}
