//! Explicit, cancellable handle over a room's change feed.

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use turnroom_protocol::{ChangeEvent, RoomId};

/// Sending half of a [`Subscription`]. Backends push events into it; the
/// send fails once the subscriber is gone.
pub type SubscriptionSender = mpsc::UnboundedSender<ChangeEvent>;

/// A live subscription to one room's changes.
///
/// Events are yielded in the order they were pushed. Once the backend
/// drops its sender (or the subscription is cancelled) [`next`] returns
/// `None`.
///
/// [`next`]: Subscription::next
#[derive(Debug)]
pub struct Subscription {
    room_id: RoomId,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    /// Background task feeding this subscription, if any.
    task: Option<AbortHandle>,
}

impl Subscription {
    /// Creates a subscription together with the sender that feeds it.
    ///
    /// Backends use this to wire up delivery; tests use it to drive a
    /// synchronizer with a synthetic event sequence.
    pub fn channel(room_id: RoomId) -> (SubscriptionSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Self {
            room_id,
            receiver: rx,
            task: None,
        };
        (tx, sub)
    }

    /// Ties a forwarding task to this subscription so it is aborted when
    /// the subscription is cancelled or dropped.
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Waits for the next event. `None` means the feed has ended.
    ///
    /// Cancel-safe: usable as a `tokio::select!` branch.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Stops delivery. Events already buffered can still be drained.
    pub fn cancel(&mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use turnroom_protocol::RoomState;

    use super::*;

    #[tokio::test]
    async fn test_subscription_yields_events_in_order() {
        let (tx, mut sub) = Subscription::channel(RoomId::new("r-1"));
        let mut second = RoomState::initial();
        second.version = 1;

        tx.send(ChangeEvent::Updated(RoomState::initial())).unwrap();
        tx.send(ChangeEvent::Updated(second.clone())).unwrap();
        drop(tx);

        assert_eq!(
            sub.next().await,
            Some(ChangeEvent::Updated(RoomState::initial()))
        );
        assert_eq!(sub.next().await, Some(ChangeEvent::Updated(second)));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_makes_sender_fail() {
        let (tx, mut sub) = Subscription::channel(RoomId::new("r-1"));

        sub.cancel();

        assert!(tx.send(ChangeEvent::Deleted).is_err());
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_aborts_forwarding_task() {
        let (_tx, sub) = Subscription::channel(RoomId::new("r-1"));
        let task = tokio::spawn(std::future::pending::<()>());
        let sub = sub.with_task(task.abort_handle());

        drop(sub);

        let joined = task.await;
        assert!(joined.unwrap_err().is_cancelled());
    }
}
