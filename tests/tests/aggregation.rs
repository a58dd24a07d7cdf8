//! End-to-end aggregation properties over the windowed store.

use aggregate_store::{AggregateStore, MemorySubstrate};
use analytics_core::{EventType, SessionIdGenerator, UserEvent};
use integration_tests::fixtures::base_time;
use pipeline::EventProcessor;
use std::sync::Arc;
use uuid::Uuid;

const FIVE_MIN_MS: i64 = 5 * 60 * 1000;
const FIFTEEN_MIN_MS: i64 = 15 * 60 * 1000;

fn setup() -> (EventProcessor, AggregateStore) {
    let store = AggregateStore::new(Arc::new(MemorySubstrate::new()));
    (EventProcessor::new(store.clone()), store)
}

#[tokio::test]
async fn processed_event_yields_all_three_counters() {
    let (processor, store) = setup();
    let user = Uuid::new_v4();
    let t0 = base_time();
    let t0_ms = t0.timestamp_millis();

    let event = UserEvent::new(user, EventType::PageView)
        .with_timestamp(t0)
        .with_page_url("/home");
    processor.process(&event).await.unwrap();

    assert_eq!(store.count_active_users(t0_ms).await.unwrap(), 1);
    assert_eq!(store.count_page_views("/home", t0_ms).await.unwrap(), 1);
    assert_eq!(store.count_sessions(&user.to_string()).await.unwrap(), 1);

    // the registered session is exactly the derived one
    let derived = SessionIdGenerator::generate(user, Some("/home"), t0);
    store.add_session(&user.to_string(), &derived).await.unwrap();
    assert_eq!(store.count_sessions(&user.to_string()).await.unwrap(), 1);
}

#[tokio::test]
async fn active_user_drops_out_after_the_window() {
    let (processor, store) = setup();
    let t0 = base_time();
    let t0_ms = t0.timestamp_millis();

    let event = UserEvent::new(Uuid::new_v4(), EventType::Click)
        .with_timestamp(t0)
        .with_page_url("/home");
    processor.process(&event).await.unwrap();

    assert_eq!(store.count_active_users(t0_ms + 1).await.unwrap(), 1);
    assert_eq!(
        store.count_active_users(t0_ms + FIVE_MIN_MS + 1).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn page_views_accumulate_then_expire() {
    let (processor, store) = setup();
    let t0 = base_time();
    let user = Uuid::new_v4();

    let mut max_ms = 0;
    for i in 0..5i64 {
        let ts = t0 + chrono::Duration::minutes(i);
        max_ms = ts.timestamp_millis();
        let event = UserEvent::new(user, EventType::PageView)
            .with_timestamp(ts)
            .with_page_url("/product/1");
        processor.process(&event).await.unwrap();
    }

    assert_eq!(store.count_page_views("/product/1", max_ms).await.unwrap(), 5);
    assert_eq!(
        store
            .count_page_views("/product/1", max_ms + FIFTEEN_MIN_MS + 1)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn replay_is_idempotent_for_users_but_not_page_views() {
    let (processor, store) = setup();
    let user = Uuid::new_v4();
    let t0 = base_time();
    let t0_ms = t0.timestamp_millis();

    let event = UserEvent::new(user, EventType::PageView)
        .with_timestamp(t0)
        .with_page_url("/home");
    processor.process(&event).await.unwrap();
    processor.process(&event).await.unwrap();

    // user set is keyed by id: no double count
    assert_eq!(store.count_active_users(t0_ms).await.unwrap(), 1);
    // each view is a distinct nonce entry: replay counts again
    assert_eq!(store.count_page_views("/home", t0_ms).await.unwrap(), 2);
    // same derived session id both times
    assert_eq!(store.count_sessions(&user.to_string()).await.unwrap(), 1);
}

#[tokio::test]
async fn non_page_view_events_still_count_a_page_view() {
    // the source system recorded a view for every event type; preserved
    let (processor, store) = setup();
    let t0_ms = base_time().timestamp_millis();

    let event = UserEvent::new(Uuid::new_v4(), EventType::AddToCart)
        .with_timestamp(base_time())
        .with_page_url("/product/9");
    processor.process(&event).await.unwrap();

    assert_eq!(store.count_page_views("/product/9", t0_ms).await.unwrap(), 1);
}

#[tokio::test]
async fn distinct_users_count_separately() {
    let (processor, store) = setup();
    let t0 = base_time();
    let t0_ms = t0.timestamp_millis();

    for _ in 0..3 {
        let event = UserEvent::new(Uuid::new_v4(), EventType::PageView)
            .with_timestamp(t0)
            .with_page_url("/home");
        processor.process(&event).await.unwrap();
    }

    assert_eq!(store.count_active_users(t0_ms).await.unwrap(), 3);
    assert_eq!(store.count_page_views("/home", t0_ms).await.unwrap(), 3);
}
