//! Concurrency tests: simultaneous joins, racing guesses and event wake-ups.

use guessing_game::{
    GameError, GameEvent, GameService, GameSettings, GuessOutcome, MemoryGameStore,
    ScriptedRandom, SessionId, ThreadRandom, WaitOutcome,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn service(target: i64, settings: GameSettings) -> (GameService, Arc<MemoryGameStore>) {
    let store = Arc::new(MemoryGameStore::new());
    let service = GameService::with_randomness(
        store.clone(),
        settings,
        Arc::new(ThreadRandom),
        Arc::new(ScriptedRandom::new([target])),
    );
    (service, store)
}

/// Wait until a spawned waiter has registered on the session channel
async fn until_subscribed(store: &MemoryGameStore, id: &SessionId, count: usize) {
    while store.subscriber_count(id) < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_two_concurrent_joins_get_distinct_ids() {
    let (service, _) = service(42, GameSettings::default());
    let id = service
        .registry()
        .create_or_validate(None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        service.create_or_join(Some(id.as_str()), "a"),
        service.create_or_join(Some(id.as_str()), "b"),
    );

    let ids: BTreeSet<_> = [a.unwrap().player_id, b.unwrap().player_id]
        .into_iter()
        .collect();
    assert_eq!(ids, BTreeSet::from([1, 2]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_joins_are_contiguous() {
    let (service, _) = service(42, GameSettings::default());
    let id = service
        .registry()
        .create_or_validate(None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..50 {
        let service = service.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_or_join(Some(id.as_str()), &format!("player{}", n))
                .await
        }));
    }

    let mut assigned = BTreeSet::new();
    for handle in handles {
        assigned.insert(handle.await.unwrap().unwrap().player_id);
    }

    assert_eq!(assigned, (1..=50).collect::<BTreeSet<_>>());
    let lobby = service.lobby_state(&id).await.unwrap();
    assert_eq!(lobby.players.len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_admits_one() {
    let (service, _) = service(42, GameSettings::default());
    let id = service
        .registry()
        .create_or_validate(None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            service.create_or_join(Some(id.as_str()), "same").await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.player_id, 1);
                admitted += 1;
            }
            Err(err) => assert!(matches!(err, GameError::Conflict(_))),
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_guesses_apply_once() {
    let (service, _) = service(90, GameSettings::default());
    let alice = service.create_or_join(None, "alice").await.unwrap();
    let id = alice.session_id;
    service
        .create_or_join(Some(id.as_str()), "bob")
        .await
        .unwrap();
    service.start_session(&id).await.unwrap();

    // Same player, same turn: exactly one submission may be applied
    let mut handles = Vec::new();
    for guess in 10..20 {
        let service = service.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            service
                .submit_guess(&id, 1, "alice", &guess.to_string())
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(GuessOutcome::Continue { now_playing, .. }) => {
                assert_eq!(now_playing, 2);
                applied += 1;
            }
            Ok(other) => panic!("unexpected outcome {:?}", other),
            Err(err) => assert!(matches!(err, GameError::Forbidden)),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(service.game_state(&id).await.unwrap().now_playing, 2);
}

#[tokio::test]
async fn test_waiter_wakes_on_move_and_over() {
    let (service, store) = service(42, GameSettings::default());
    let alice = service.create_or_join(None, "alice").await.unwrap();
    let id = alice.session_id;
    service.start_session(&id).await.unwrap();

    let waiter = {
        let service = service.clone();
        let id = id.clone();
        tokio::spawn(async move {
            service
                .await_next_event(&id, std::future::pending())
                .await
        })
    };
    until_subscribed(&store, &id, 1).await;

    service.submit_guess(&id, 1, "alice", "10").await.unwrap();
    assert_eq!(
        waiter.await.unwrap().unwrap(),
        WaitOutcome::Event(GameEvent::Move)
    );

    let waiter = {
        let service = service.clone();
        let id = id.clone();
        tokio::spawn(async move {
            service
                .await_next_event(&id, std::future::pending())
                .await
        })
    };
    until_subscribed(&store, &id, 1).await;

    service.submit_guess(&id, 1, "alice", "42").await.unwrap();
    assert_eq!(
        waiter.await.unwrap().unwrap(),
        WaitOutcome::Event(GameEvent::Over)
    );
}

#[tokio::test]
async fn test_every_waiter_receives_the_event() {
    let (service, store) = service(42, GameSettings::default());
    let alice = service.create_or_join(None, "alice").await.unwrap();
    let id = alice.session_id;
    service.start_session(&id).await.unwrap();

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let service = service.clone();
        let id = id.clone();
        waiters.push(tokio::spawn(async move {
            service
                .await_next_event(&id, std::future::pending())
                .await
        }));
    }
    until_subscribed(&store, &id, 3).await;

    service.submit_guess(&id, 1, "alice", "99").await.unwrap();

    for waiter in waiters {
        assert_eq!(
            waiter.await.unwrap().unwrap(),
            WaitOutcome::Event(GameEvent::Move)
        );
    }
    assert_eq!(store.subscriber_count(&id), 0);
}

#[tokio::test]
async fn test_cancelled_waiter_returns_without_event() {
    let (service, store) = service(42, GameSettings::default());
    let alice = service.create_or_join(None, "alice").await.unwrap();
    let id = alice.session_id;
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let waiter = {
        let service = service.clone();
        let id = id.clone();
        tokio::spawn(async move {
            service
                .await_next_event(&id, async {
                    let _ = cancel_rx.await;
                })
                .await
        })
    };
    until_subscribed(&store, &id, 1).await;

    cancel_tx.send(()).unwrap();
    assert_eq!(waiter.await.unwrap().unwrap(), WaitOutcome::Cancelled);
    assert_eq!(store.subscriber_count(&id), 0);
}

#[tokio::test]
async fn test_configured_timeout_ends_wait() {
    let settings = GameSettings {
        event_wait_timeout_secs: 1,
        ..GameSettings::default()
    };
    let (service, _) = service(42, settings);
    let alice = service.create_or_join(None, "alice").await.unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        service.await_next_event(&alice.session_id, std::future::pending()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome, WaitOutcome::TimedOut);
}
