use std::time::Duration;

use driftgate_provider_core::{CredentialPool, CredentialState, Event, EventHub, OperationalEvent, UnavailableReason};
use tokio::time::timeout;
use uuid::Uuid;

#[tokio::test]
async fn unavailable_recovers_via_queue() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();
    let pool = CredentialPool::new(hub);
    let key_id = Uuid::new_v4();

    pool.mark_unavailable(key_id, Duration::from_millis(50), UnavailableReason::RateLimit)
        .await;

    let ev = timeout(Duration::from_millis(200), rx.recv()).await.unwrap().unwrap();
    assert!(matches!(ev, Event::Operational(OperationalEvent::UnavailableStart(_))));

    let ev = timeout(Duration::from_millis(500), rx.recv()).await.unwrap().unwrap();
    assert!(matches!(ev, Event::Operational(OperationalEvent::UnavailableEnd(_))));

    assert!(pool.is_available(key_id).await);
}

#[tokio::test]
async fn stale_queue_entry_does_not_recover_early() {
    let hub = EventHub::new(32);
    let pool = CredentialPool::new(hub);
    let key_id = Uuid::new_v4();

    pool.mark_unavailable(key_id, Duration::from_millis(80), UnavailableReason::Timeout)
        .await;
    pool.mark_unavailable(key_id, Duration::from_millis(200), UnavailableReason::Timeout)
        .await;

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(
        pool.state(key_id).await,
        Some(CredentialState::Unavailable { .. })
    ));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(pool.is_available(key_id).await);
}

#[tokio::test]
async fn unmarked_credential_has_no_recorded_state() {
    let pool = CredentialPool::new(EventHub::new(4));
    let key_id = Uuid::new_v4();
    assert!(pool.state(key_id).await.is_none());
    assert!(pool.is_available(key_id).await);
}

#[tokio::test]
async fn per_model_unavailability_does_not_affect_other_models() {
    let pool = CredentialPool::new(EventHub::new(4));
    let key_id = Uuid::new_v4();

    pool.mark_model_unavailable(key_id, "gpt-4o", Duration::from_millis(80), UnavailableReason::ModelDisallow)
        .await;

    assert!(!pool.is_model_available(key_id, "gpt-4o").await);
    assert!(pool.is_model_available(key_id, "gpt-3.5-turbo").await);
}
