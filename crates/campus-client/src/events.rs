//! Client events for the presentation layer.
//!
//! The client never navigates or renders anything itself. It reports
//! through an [`EventSink`] and the UI layer decides what to show.

use tokio::sync::{broadcast, mpsc};

/// Something the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Renewal failed and the session was cleared. The UI should send the
    /// user back to the login entry point. May be emitted more than once for
    /// one expiry when several calls were waiting on the same renewal.
    SessionExpired,
    /// A call failed with a non-auth error.
    RequestFailed {
        /// HTTP status, `None` for transport failures.
        status: Option<u16>,
        /// Human-readable message extracted from the response.
        message: String,
    },
}

/// Receiver of [`ClientEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ClientEvent) {}
}

impl EventSink for mpsc::UnboundedSender<ClientEvent> {
    fn emit(&self, event: ClientEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Client event dropped: receiver closed");
        }
    }
}

impl EventSink for broadcast::Sender<ClientEvent> {
    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine: nobody is listening.
        let _ = self.send(event);
    }
}

/// Sink wrapping a callback.
pub struct CallbackSink<F>(pub F);

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(ClientEvent) + Send + Sync,
{
    fn emit(&self, event: ClientEvent) {
        (self.0)(event)
    }
}
