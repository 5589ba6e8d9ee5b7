//! Event notifier: per-session move/over broadcasts.
//!
//! Delivery is fire-and-forget. A waiter only sees events published after it
//! subscribed, and the events carry no data, so waiters re-read the game
//! state after waking.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::GameResult;
use crate::models::{GameEvent, SessionId};
use crate::store::{GameStore, Subscription};

/// How a cancellable wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// An event arrived
    Event(GameEvent),
    /// The caller's cancellation signal fired first
    Cancelled,
    /// The configured timeout elapsed first
    TimedOut,
}

/// Event notifier
#[derive(Clone)]
pub struct EventNotifier {
    store: Arc<dyn GameStore>,
}

impl EventNotifier {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Broadcast `event` to the session's current subscribers
    pub async fn publish(&self, session_id: &SessionId, event: GameEvent) -> GameResult<()> {
        self.store.publish(session_id, event).await?;
        log::debug!("Game {}: published {}", session_id, event);
        Ok(())
    }

    /// Register interest without waiting yet.
    ///
    /// Useful when the caller must be subscribed before triggering the
    /// action it wants to observe.
    pub async fn subscribe(&self, session_id: &SessionId) -> GameResult<Subscription> {
        self.store.subscribe(session_id).await
    }

    /// Subscribe and block until exactly one event arrives. No timeout.
    pub async fn wait_next(&self, session_id: &SessionId) -> GameResult<GameEvent> {
        let mut subscription = self.subscribe(session_id).await?;
        subscription.next().await
    }

    /// Subscribe and wait for one event, giving up when `cancel` resolves or
    /// `timeout` elapses. The subscription is dropped on every exit path.
    pub async fn wait_next_until<F>(
        &self,
        session_id: &SessionId,
        cancel: F,
        timeout: Option<Duration>,
    ) -> GameResult<WaitOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        let mut subscription = self.subscribe(session_id).await?;
        wait_on(&mut subscription, cancel, timeout).await
    }
}

/// Wait for the next event on an existing subscription
pub async fn wait_on<F>(
    subscription: &mut Subscription,
    cancel: F,
    timeout: Option<Duration>,
) -> GameResult<WaitOutcome>
where
    F: Future<Output = ()> + Send,
{
    let session_id = subscription.session_id().clone();
    let deadline = async {
        match timeout {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        event = subscription.next() => Ok(WaitOutcome::Event(event?)),
        _ = cancel => {
            log::debug!("Wait on game {} cancelled", session_id);
            Ok(WaitOutcome::Cancelled)
        }
        _ = deadline => Ok(WaitOutcome::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGameStore;
    use tokio::sync::oneshot;

    fn notifier() -> (EventNotifier, Arc<MemoryGameStore>) {
        let store = Arc::new(MemoryGameStore::new());
        (EventNotifier::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_wait_next_receives_published_event() {
        let (notifier, store) = notifier();
        let id = SessionId::new("1");

        let waiter = {
            let notifier = notifier.clone();
            let id = id.clone();
            tokio::spawn(async move { notifier.wait_next(&id).await })
        };

        while store.subscriber_count(&id) == 0 {
            tokio::task::yield_now().await;
        }
        notifier.publish(&id, GameEvent::Move).await.unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), GameEvent::Move);
        assert_eq!(store.subscriber_count(&id), 0);
    }

    #[tokio::test]
    async fn test_other_sessions_do_not_wake_waiter() {
        let (notifier, _) = notifier();
        let mine = SessionId::new("1");
        let other = SessionId::new("2");

        let mut subscription = notifier.subscribe(&mine).await.unwrap();
        notifier.publish(&other, GameEvent::Over).await.unwrap();

        let outcome = wait_on(
            &mut subscription,
            std::future::pending(),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_cancel_releases_subscription() {
        let (notifier, store) = notifier();
        let id = SessionId::new("1");
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let waiter = {
            let notifier = notifier.clone();
            let id = id.clone();
            tokio::spawn(async move {
                notifier
                    .wait_next_until(
                        &id,
                        async {
                            let _ = cancel_rx.await;
                        },
                        None,
                    )
                    .await
            })
        };

        while store.subscriber_count(&id) == 0 {
            tokio::task::yield_now().await;
        }
        cancel_tx.send(()).unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), WaitOutcome::Cancelled);
        assert_eq!(store.subscriber_count(&id), 0);
    }

    #[tokio::test]
    async fn test_subscribed_before_publish_sees_event() {
        let (notifier, _) = notifier();
        let id = SessionId::new("1");

        let mut subscription = notifier.subscribe(&id).await.unwrap();
        notifier.publish(&id, GameEvent::Over).await.unwrap();

        let outcome = wait_on(&mut subscription, std::future::pending(), None)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Event(GameEvent::Over));
    }
}
