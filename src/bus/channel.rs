//! Channel-backed bus.
//!
//! Monitors publish through a bounded tokio mpsc channel; the panel owns the
//! receiving end. Publishing never waits: a full channel is reported as
//! [`CommsError::Full`] and the monitor falls back to storage.

use tokio::sync::mpsc;

use super::{Bus, Message};
use crate::error::CommsError;
use crate::store::TabId;

/// A message together with the tab that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub tab: TabId,
    pub message: Message,
}

/// [`Bus`] over a tokio mpsc channel.
///
/// # Example
///
/// ```
/// use chartwatch::bus::{Bus, ChannelBus, Message};
///
/// let (bus, mut rx) = ChannelBus::create(16);
/// bus.publish(1, Message::GetStatus).unwrap();
/// assert_eq!(rx.try_recv().unwrap().tab, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: mpsc::Sender<Envelope>,
}

impl ChannelBus {
    pub fn new(sender: mpsc::Sender<Envelope>) -> Self {
        Self { sender }
    }

    /// Create a bus and the receiver for everything published on it.
    pub fn create(buffer: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl Bus for ChannelBus {
    fn publish(&self, tab: TabId, message: Message) -> Result<(), CommsError> {
        self.sender
            .try_send(Envelope { tab, message })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => CommsError::Full,
                mpsc::error::TrySendError::Closed(_) => CommsError::Disconnected,
            })
    }
}
