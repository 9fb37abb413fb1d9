use bytes::Bytes;
use futures::StreamExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use volley::batch::{Batch, BatchConfig, BatchEvent};
use volley::fetch::{DeadlinePolicy, OutcomeKind, RequestId};
use volley::http::{HttpResponse, MockHttpClient};
use volley::{UrlTemplate, VolleyError};

const TEMPLATE: &str = "http://api.test/photos/{id}";

fn url(id: u32) -> String {
    format!("http://api.test/photos/{id}")
}

fn config(
    batch_size: u32,
    per_fetch_timeout_ms: u64,
    deadline_policy: DeadlinePolicy,
) -> BatchConfig {
    BatchConfig {
        batch_size,
        per_fetch_timeout_ms,
        url_template: UrlTemplate::new(TEMPLATE).unwrap(),
        deadline_policy,
    }
}

fn mock_all_ok(n: u32) -> MockHttpClient {
    let mock = MockHttpClient::new();
    for i in 0..n {
        mock.add_response(&url(i), Ok(HttpResponse::ok(format!("payload-{i}"))));
    }
    mock
}

/// id 0 succeeds with "A", id 1 outlives any short deadline, id 2 is refused.
fn mock_mixed() -> MockHttpClient {
    let mock = MockHttpClient::new();
    mock.add_response(&url(0), Ok(HttpResponse::ok("A")));
    mock.add_delayed_response(
        &url(1),
        Duration::from_secs(10),
        Ok(HttpResponse::ok("late")),
    );
    mock.add_response(
        &url(2),
        Err(VolleyError::Transport("refused".to_string())),
    );
    mock
}

#[test_log::test(tokio::test)]
async fn test_batch_yields_exactly_one_outcome_per_request() {
    for n in [0u32, 1, 3, 10, 25] {
        let mock = mock_all_ok(n);
        let batch = Batch::new(Arc::new(mock.clone()), config(n, 1000, DeadlinePolicy::Abort));

        let report = batch.run(&CancellationToken::new()).collect().await;

        assert_eq!(report.total(), n as usize, "batch of {n}");
        let ids: BTreeSet<RequestId> = report.kinds().into_keys().collect();
        let expected: BTreeSet<RequestId> = (0..n).map(RequestId).collect();
        assert_eq!(ids, expected, "batch of {n}");

        let summary = report.summary.expect("completion signal missing");
        assert_eq!(summary.size, n);
        assert_eq!(summary.total(), n);
        assert_eq!(mock.call_count(), n as usize);
    }
}

#[test_log::test(tokio::test)]
async fn test_all_succeed_within_deadline() {
    let batch = Batch::new(Arc::new(mock_all_ok(10)), config(10, 1000, DeadlinePolicy::Abort));

    let report = batch.run(&CancellationToken::new()).collect().await;

    assert!(report.failures.is_empty());
    assert_eq!(report.successes.len(), 10);
    for (id, body) in &report.successes {
        assert_eq!(body, &Bytes::from(format!("payload-{id}")));
    }
    assert_eq!(report.summary.unwrap().succeeded, 10);
}

#[test_log::test(tokio::test)]
async fn test_timeout_delivered_while_operation_still_running() {
    let mock = MockHttpClient::new();
    mock.add_delayed_response(&url(0), Duration::from_millis(500), Ok(HttpResponse::ok("late")));

    let batch = Batch::new(Arc::new(mock.clone()), config(1, 10, DeadlinePolicy::Detach));
    let mut handle = batch.run(&CancellationToken::new());

    match handle.next_event().await {
        Some(BatchEvent::Outcome(outcome)) => {
            assert_eq!(outcome.id, RequestId(0));
            assert_eq!(outcome.outcome.kind(), OutcomeKind::DeadlineExceeded);
        }
        other => panic!("Expected an outcome, got {:?}", other),
    }
    // The stubbed operation has not finished yet
    assert_eq!(mock.in_flight_count(), 1);
    assert_eq!(mock.finished_count(), 0);

    assert!(matches!(handle.next_event().await, Some(BatchEvent::Completed(_))));
    assert!(handle.next_event().await.is_none());
}

#[test_log::test(tokio::test)]
async fn test_timeout_aborts_operation_by_default() {
    let mock = MockHttpClient::new();
    mock.add_delayed_response(&url(0), Duration::from_secs(10), Ok(HttpResponse::ok("late")));

    let batch = Batch::new(Arc::new(mock.clone()), config(1, 10, DeadlinePolicy::Abort));
    let report = batch.run(&CancellationToken::new()).collect().await;

    assert_eq!(report.kinds()[&RequestId(0)], OutcomeKind::DeadlineExceeded);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.in_flight_count(), 0);
    assert_eq!(mock.finished_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_failing_subset_routed_to_failure_stream() {
    let n = 8;
    let failing: BTreeSet<u32> = [1, 4, 5].into_iter().collect();

    let mock = MockHttpClient::new();
    for i in 0..n {
        if failing.contains(&i) {
            mock.add_response(&url(i), Err(VolleyError::Transport(format!("refused {i}"))));
        } else {
            mock.add_response(&url(i), Ok(HttpResponse::ok(format!("ok {i}"))));
        }
    }

    let batch = Batch::new(Arc::new(mock), config(n, 1000, DeadlinePolicy::Abort));
    let (successes, failures) = batch.run(&CancellationToken::new()).split();

    // The success stream ends only once all n requests have reported
    let succeeded: BTreeSet<u32> = successes.map(|(id, _)| id.0).collect().await;
    let failed: BTreeSet<u32> = failures.map(|(id, _)| id.0).collect().await;

    assert_eq!(failed, failing);
    let expected: BTreeSet<u32> = (0..n).filter(|i| !failing.contains(i)).collect();
    assert_eq!(succeeded, expected);
    assert_eq!(succeeded.len() + failed.len(), n as usize);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_rerun_produces_same_outcome_kinds() {
    async fn run_once() -> BTreeMap<RequestId, OutcomeKind> {
        let batch = Batch::new(Arc::new(mock_mixed()), config(3, 20, DeadlinePolicy::Abort));
        batch.run(&CancellationToken::new()).collect().await.kinds()
    }

    let first = run_once().await;
    let second = run_once().await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_mixed_scenario_unified_stream() {
    let batch = Batch::new(Arc::new(mock_mixed()), config(3, 1, DeadlinePolicy::Abort));
    let report = batch.run(&CancellationToken::new()).collect().await;

    assert_eq!(report.successes, vec![(RequestId(0), Bytes::from_static(b"A"))]);

    let mut failures: Vec<(RequestId, String)> = report
        .failures
        .iter()
        .map(|(id, e)| (*id, e.to_string()))
        .collect();
    failures.sort();
    assert_eq!(
        failures,
        vec![
            (RequestId(1), "deadline exceeded after 1ms".to_string()),
            (RequestId(2), "transport error: refused".to_string()),
        ]
    );

    let summary = report.summary.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_mixed_scenario_split_streams() {
    let batch = Batch::new(Arc::new(mock_mixed()), config(3, 1, DeadlinePolicy::Abort));
    let (mut successes, mut failures) = batch.run(&CancellationToken::new()).split();

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    // One loop with no preference between the streams, exiting on completion
    loop {
        tokio::select! {
            success = successes.recv() => match success {
                Some(item) => succeeded.push(item),
                None => break,
            },
            Some((id, e)) = failures.recv() => failed.push((id, OutcomeKind::from(&e))),
        }
    }
    // Failures that raced the completion signal are still there
    while let Some((id, e)) = failures.recv().await {
        failed.push((id, OutcomeKind::from(&e)));
    }

    failed.sort();
    assert_eq!(succeeded, vec![(RequestId(0), Bytes::from_static(b"A"))]);
    assert_eq!(
        failed,
        vec![
            (RequestId(1), OutcomeKind::DeadlineExceeded),
            (RequestId(2), OutcomeKind::Transport),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_root_cancellation_resolves_pending_requests() {
    let mock = MockHttpClient::new();
    mock.add_response(&url(0), Ok(HttpResponse::ok("quick")));
    let _held_1 = mock.add_response_with_trigger(&url(1), Ok(HttpResponse::ok("held")));
    let _held_2 = mock.add_response_with_trigger(&url(2), Ok(HttpResponse::ok("held")));

    let root = CancellationToken::new();
    let batch = Batch::new(Arc::new(mock.clone()), config(3, 10_000, DeadlinePolicy::Abort));
    let mut handle = batch.run(&root);

    match handle.next_event().await {
        Some(BatchEvent::Outcome(outcome)) => assert_eq!(outcome.id, RequestId(0)),
        other => panic!("Expected the quick outcome, got {:?}", other),
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.in_flight_count(), 2);

    root.cancel();

    let report = handle.collect().await;
    let kinds = report.kinds();
    assert_eq!(kinds[&RequestId(1)], OutcomeKind::Cancelled);
    assert_eq!(kinds[&RequestId(2)], OutcomeKind::Cancelled);
    assert_eq!(report.summary.unwrap().failed, 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.in_flight_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_handle_cancel_stops_only_this_batch() {
    let mock = MockHttpClient::new();
    let _held = mock.add_response_with_trigger(&url(0), Ok(HttpResponse::ok("held")));

    let root = CancellationToken::new();
    let batch = Batch::new(Arc::new(mock), config(1, 10_000, DeadlinePolicy::Abort));
    let handle = batch.run(&root);
    handle.cancel();

    let report = handle.collect().await;
    assert_eq!(report.kinds()[&RequestId(0)], OutcomeKind::Cancelled);
    assert!(!root.is_cancelled());
}

#[test_log::test(tokio::test)]
async fn test_dropped_handle_still_runs_every_request() {
    let mock = MockHttpClient::new();
    for i in 0..4 {
        mock.add_delayed_response(&url(i), Duration::from_millis(10), Ok(HttpResponse::ok("x")));
    }

    let batch = Batch::new(Arc::new(mock.clone()), config(4, 1000, DeadlinePolicy::Abort));
    drop(batch.run(&CancellationToken::new()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(mock.call_count(), 4);
    assert_eq!(mock.finished_count(), 4);
}

#[test_log::test(tokio::test)]
async fn test_unified_stream_ends_after_completed() {
    let batch = Batch::new(Arc::new(mock_all_ok(3)), config(3, 1000, DeadlinePolicy::Abort));
    let handle = batch.run(&CancellationToken::new());
    let events: Vec<BatchEvent> = StreamExt::collect(handle).await;

    assert_eq!(events.len(), 4);
    assert!(matches!(events.last(), Some(BatchEvent::Completed(_))));
    assert!(
        events[..3]
            .iter()
            .all(|event| matches!(event, BatchEvent::Outcome(_)))
    );
}
