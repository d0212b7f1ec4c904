//! Port traits for the external collaborators: the message stream, the
//! recipient directory, and the push transport. The bridge adapts these; it
//! does not reimplement them.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    DeliveryFailure, InboundMessage, Recipient, RecipientFilter, SignalPayload, StreamFault,
};

/// Long-lived message stream.
///
/// Subscriptions are not restartable: after any disconnect a fresh
/// `connect` + `subscribe` cycle is required before `next_message` is
/// meaningful again.
#[async_trait]
pub trait StreamSource: Send {
    /// Establish the transport connection.
    async fn connect(&mut self) -> std::result::Result<(), StreamFault>;

    /// Attach to the configured channel.
    async fn subscribe(&mut self) -> std::result::Result<(), StreamFault>;

    /// Block until the next inbound message arrives.
    async fn next_message(&mut self) -> std::result::Result<InboundMessage, StreamFault>;

    /// Tear the connection down. Never fails; the supervisor reconnects from
    /// scratch regardless.
    async fn disconnect(&mut self);
}

/// Subscriber directory. Queried fresh for every dispatch; the bridge never
/// caches recipients across directives.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn list_recipients(&self, filter: &RecipientFilter) -> Result<Vec<Recipient>>;
}

/// Push transport. One send per recipient per dispatch; no retries here.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &SignalPayload,
    ) -> std::result::Result<(), DeliveryFailure>;
}
