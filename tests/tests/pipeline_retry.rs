//! Retry, backoff, and dead-letter behavior of the pipeline worker.

use aggregate_store::AggregateStore;
use analytics_core::{Error, EventType, UserEvent};
use integration_tests::fixtures::{
    base_time, header_str, malformed_message, page_view, raw_message, TEST_TOPIC,
};
use integration_tests::mocks::{FlakySubstrate, MockDeadLetterSink, MockSource};
use kafka_transport::topics::headers;
use pipeline::{EventProcessor, Outcome, PipelineWorker, RetryConfig, RetryPolicy};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::from_config(&RetryConfig {
        max_attempts,
        initial_interval_ms: 10,
        multiplier: 2.0,
        max_interval_ms: 50,
        ..RetryConfig::default()
    })
}

struct Harness {
    worker: PipelineWorker,
    source: Arc<MockSource>,
    sink: Arc<MockDeadLetterSink>,
    substrate: Arc<FlakySubstrate>,
    store: AggregateStore,
    shutdown_tx: watch::Sender<bool>,
}

fn harness(substrate: FlakySubstrate, max_attempts: u32) -> Harness {
    let substrate = Arc::new(substrate);
    let store = AggregateStore::new(substrate.clone());
    let source = Arc::new(MockSource::new(2));
    let sink = Arc::new(MockDeadLetterSink::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = PipelineWorker::new(
        source.clone(),
        sink.clone(),
        Arc::new(EventProcessor::new(store.clone())),
        fast_policy(max_attempts),
        shutdown_rx,
    );

    Harness {
        worker,
        source,
        sink,
        substrate,
        store,
        shutdown_tx,
    }
}

#[tokio::test(start_paused = true)]
async fn retryable_failure_is_attempted_max_attempts_then_dead_lettered() {
    let mut h = harness(FlakySubstrate::always_failing(), 5);
    let message = raw_message(&page_view(Uuid::new_v4(), "/home", base_time()), 2, 42);

    let outcome = h.worker.handle(&message).await.unwrap();

    assert_eq!(outcome, Outcome::DeadLettered);
    // each attempt fails on its first scored write
    assert_eq!(h.substrate.write_attempts(), 5);
    assert_eq!(h.sink.record_count(), 1);

    let record = &h.sink.captured()[0];
    assert_eq!(record.topic, format!("{TEST_TOPIC}.DLT"));
    assert_eq!(record.partition, Some(2));
    assert_eq!(header_str(record, headers::ORIGINAL_TOPIC), TEST_TOPIC);
    assert_eq!(header_str(record, headers::ORIGINAL_PARTITION), "2");
    assert_eq!(header_str(record, headers::ORIGINAL_OFFSET), "42");
    assert!(header_str(record, headers::EXCEPTION_MESSAGE).starts_with("Transient"));
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_skips_the_retry_budget() {
    let mut h = harness(FlakySubstrate::failing_times(0), 5);
    // no page url: the store rejects the event as invalid input
    let event = UserEvent::new(Uuid::new_v4(), EventType::Search).with_timestamp(base_time());
    let message = raw_message(&event, 2, 7);

    let outcome = h.worker.handle(&message).await.unwrap();

    assert_eq!(outcome, Outcome::DeadLettered);
    // exactly one attempt reached the store
    assert_eq!(h.substrate.write_attempts(), 1);
    assert_eq!(h.sink.record_count(), 1);
    assert!(
        header_str(&h.sink.captured()[0], headers::EXCEPTION_MESSAGE)
            .starts_with("InvalidArgument")
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_poison_and_never_reaches_the_store() {
    let mut h = harness(FlakySubstrate::failing_times(0), 5);
    let message = malformed_message(2, 13);

    let outcome = h.worker.handle(&message).await.unwrap();

    assert_eq!(outcome, Outcome::DeadLettered);
    assert_eq!(h.substrate.write_attempts(), 0);

    let record = &h.sink.captured()[0];
    assert_eq!(record.payload, b"{not json".to_vec());
    assert!(header_str(record, headers::EXCEPTION_MESSAGE).starts_with("PoisonMessage"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_the_budget() {
    let mut h = harness(FlakySubstrate::failing_times(2), 5);
    let user = Uuid::new_v4();
    let message = raw_message(&page_view(user, "/home", base_time()), 2, 0);

    let outcome = h.worker.handle(&message).await.unwrap();

    assert_eq!(outcome, Outcome::Processed);
    assert_eq!(h.sink.record_count(), 0);
    assert_eq!(
        h.store
            .count_active_users(base_time().timestamp_millis())
            .await
            .unwrap(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn failed_dead_letter_publish_is_fatal() {
    let h = harness(FlakySubstrate::failing_times(0), 5);
    h.sink.set_should_fail(true);
    let mut worker = h.worker;

    let err = worker.handle(&malformed_message(2, 3)).await.unwrap_err();
    assert!(matches!(err, Error::FatalPublish(_)));
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_backoff_without_acknowledging() {
    let mut h = harness(FlakySubstrate::always_failing(), 5);
    h.shutdown_tx.send(true).unwrap();

    let message = raw_message(&page_view(Uuid::new_v4(), "/home", base_time()), 2, 9);
    let outcome = h.worker.handle(&message).await.unwrap();

    assert_eq!(outcome, Outcome::Aborted);
    assert_eq!(h.sink.record_count(), 0);
    assert!(h.source.committed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_loop_commits_in_order_after_each_message() {
    let substrate = Arc::new(FlakySubstrate::failing_times(0));
    let store = AggregateStore::new(substrate.clone());
    let sink = Arc::new(MockDeadLetterSink::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let source = Arc::new(MockSource::new(0).shutdown_when_drained(shutdown_tx));

    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    source.push_batch(vec![
        raw_message(&page_view(u1, "/home", base_time()), 0, 7),
        raw_message(&page_view(u2, "/cart", base_time()), 0, 8),
    ]);

    let worker = PipelineWorker::new(
        source.clone(),
        sink.clone(),
        Arc::new(EventProcessor::new(store.clone())),
        fast_policy(5),
        shutdown_rx,
    );
    worker.run().await.unwrap();

    assert_eq!(source.committed(), vec![8, 9]);
    assert_eq!(
        store
            .count_active_users(base_time().timestamp_millis())
            .await
            .unwrap(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_dead_letters_poison_and_still_advances() {
    let substrate = Arc::new(FlakySubstrate::failing_times(0));
    let store = AggregateStore::new(substrate.clone());
    let sink = Arc::new(MockDeadLetterSink::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let source = Arc::new(MockSource::new(0).shutdown_when_drained(shutdown_tx));

    source.push_batch(vec![
        malformed_message(0, 3),
        raw_message(&page_view(Uuid::new_v4(), "/home", base_time()), 0, 4),
    ]);

    let worker = PipelineWorker::new(
        source.clone(),
        sink.clone(),
        Arc::new(EventProcessor::new(store.clone())),
        fast_policy(3),
        shutdown_rx,
    );
    worker.run().await.unwrap();

    assert_eq!(sink.record_count(), 1);
    // both offsets acknowledged: the poison message via its dead letter
    assert_eq!(source.committed(), vec![4, 5]);
}
