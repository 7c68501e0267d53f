//! Session lifecycle notifications.

use tokio::sync::broadcast;
use tracing::trace;

use questlog_core::Identity;

/// A change in session state that the rest of the application may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login completed.
    SignedIn(Option<Identity>),
    /// The credential pair was renewed.
    Refreshed,
    /// The session was ended on request.
    SignedOut,
    /// The session could not be refreshed and was cleared; the user must
    /// sign in again.
    AuthenticationRequired,
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        trace!(?event, "Session event");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}
