//! Event helpers for integration tests

use std::time::Duration;
use tokio::sync::broadcast;
use vidpipe::{Event, Pipeline, PipelineState};

/// Every event already sent to `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Overall percentages of the progress events, in order
pub fn progress_percents(events: &[Event]) -> Vec<f32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(p) => Some(p.overall_percent),
            _ => None,
        })
        .collect()
}

/// Assert overall progress never decreases and stays within 0..=100
pub fn assert_monotonic(percents: &[f32]) {
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {percents:?}"
    );
    assert!(
        percents.iter().all(|p| (0.0..=100.0).contains(p)),
        "progress out of range: {percents:?}"
    );
}

/// Wait until the pipeline reaches `state`
pub async fn wait_for_state(pipeline: &Pipeline, state: PipelineState, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while pipeline.state().await != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for pipeline state");
}

/// Wait for the first progress event above `percent`
pub async fn wait_for_progress_above(
    rx: &mut broadcast::Receiver<Event>,
    percent: f32,
    timeout: Duration,
) {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(Event::Progress(p)) if p.overall_percent > percent => return,
                Ok(_) => continue,
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for progress");
}
