//! Fan-out of session lifecycle events to UI listeners.

use fleetdesk_model::SessionEvent;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 16;

/// Broadcasts [`SessionEvent`]s to any number of subscribers.
///
/// Delivery is fire-and-forget: with no subscribers the event is dropped,
/// and a subscriber that falls more than `capacity` events behind sees
/// `RecvError::Lagged` and skips ahead. Clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// A receiver for every event sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Sends `event` to current subscribers. Returns how many got it.
    pub fn notify(&self, event: SessionEvent) -> usize {
        tracing::info!(event = event.name(), user_id = %event.user_id(), "session event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use fleetdesk_model::UserId;

    use super::*;

    #[tokio::test]
    async fn test_notify_reaches_every_subscriber() {
        let notifier = EventNotifier::default();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        let user = UserId::random();

        let delivered = notifier.notify(SessionEvent::Replaced { user_id: user });

        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await.unwrap(), SessionEvent::Replaced { user_id: user });
        assert_eq!(b.recv().await.unwrap(), SessionEvent::Replaced { user_id: user });
    }

    #[test]
    fn test_notify_without_subscribers_returns_zero() {
        let notifier = EventNotifier::default();

        assert_eq!(
            notifier.notify(SessionEvent::Expired {
                user_id: UserId::random()
            }),
            0
        );
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let notifier = EventNotifier::default();
        let mut rx = notifier.subscribe();
        let user = UserId::random();

        notifier.clone().notify(SessionEvent::Expired { user_id: user });

        assert_eq!(rx.recv().await.unwrap().user_id(), user);
    }
}
