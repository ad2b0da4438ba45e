use crate::error::Error;
use crate::pipeline::test_helpers::{
    Script, VIDEO_URL, create_test_pipeline, drain_events, fetch_line, progress_percents,
};
use crate::types::{DownloadRequest, Event, PipelineState};
use std::time::Duration;

// --- cancel() tests ---

#[tokio::test]
async fn test_cancel_when_idle_returns_false() {
    let (pipeline, _runner, _temp_dir) = create_test_pipeline([]);
    let mut events = pipeline.subscribe();

    assert!(!pipeline.cancel().await);
    assert_eq!(pipeline.state().await, PipelineState::Idle);
    assert!(drain_events(&mut events).is_empty());
}

#[tokio::test]
async fn test_cancel_mid_download_stops_progress() {
    let mut download = Script::ok().line_delay(Duration::from_millis(10));
    for step in 0..200 {
        download = download.stdout(&fetch_line(step as f32 / 2.0));
    }
    let (pipeline, runner, temp_dir) =
        create_test_pipeline([Script::ok().stdout("Clip"), download.hold_open()]);
    let mut events = pipeline.subscribe();

    let background = pipeline.clone();
    let request = DownloadRequest::new(VIDEO_URL, temp_dir.path());
    let task = tokio::spawn(async move { background.start_download(request).await });

    // Let some real progress through first
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(Event::Progress(p)) = events.recv().await
                && p.overall_percent > 5.0
            {
                break;
            }
        }
    })
    .await
    .unwrap();

    assert!(pipeline.cancel().await);
    assert_eq!(pipeline.state().await, PipelineState::Cancelled);

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    // Let any late output arrive before checking
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after: Vec<Event> = drain_events(&mut events)
        .into_iter()
        .skip_while(|e| *e != Event::Cancelled)
        .collect();
    assert_eq!(after.first(), Some(&Event::Cancelled));
    assert!(
        progress_percents(&after).is_empty(),
        "no progress may follow a cancel: {after:?}"
    );
    assert_eq!(runner.calls().len(), 2);
    assert_eq!(pipeline.state().await, PipelineState::Cancelled);
}

#[tokio::test]
async fn test_cancel_during_title_lookup_spawns_no_download() {
    let (pipeline, runner, temp_dir) = create_test_pipeline([Script::ok().hold_open()]);

    let background = pipeline.clone();
    let request = DownloadRequest::new(VIDEO_URL, temp_dir.path());
    let task = tokio::spawn(async move { background.start_download(request).await });
    runner.wait_for_calls(1).await;

    assert!(pipeline.cancel().await);
    let result = task.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_cancel_after_completion_returns_false() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dest = temp_dir.path();
    let (pipeline, _runner, _unused) = create_test_pipeline([
        Script::ok().stdout("Clip"),
        Script::ok().creates(dest.join("Clip.mp4")),
    ]);

    pipeline
        .start_download(DownloadRequest::new(VIDEO_URL, dest))
        .await
        .unwrap();

    assert!(!pipeline.cancel().await);
    assert!(matches!(
        pipeline.state().await,
        PipelineState::Completed { .. }
    ));
}

#[tokio::test]
async fn test_clones_share_state() {
    let (pipeline, runner, temp_dir) = create_test_pipeline([
        Script::ok().stdout("Clip"),
        Script::ok().hold_open(),
    ]);
    let other = pipeline.clone();

    let request = DownloadRequest::new(VIDEO_URL, temp_dir.path());
    let task = tokio::spawn(async move { other.start_download(request).await });
    runner.wait_for_calls(2).await;

    assert_eq!(pipeline.state().await, PipelineState::Downloading);
    assert!(pipeline.cancel().await);
    assert!(!pipeline.cancel().await, "a second cancel finds nothing active");
    assert!(task.await.unwrap().is_err());
}

// --- shutdown() tests ---

#[tokio::test]
async fn test_shutdown_cancels_and_emits_event() {
    let (pipeline, runner, temp_dir) = create_test_pipeline([
        Script::ok().stdout("Clip"),
        Script::ok().hold_open(),
    ]);
    let mut events = pipeline.subscribe();

    let background = pipeline.clone();
    let request = DownloadRequest::new(VIDEO_URL, temp_dir.path());
    let task = tokio::spawn(async move { background.start_download(request).await });
    runner.wait_for_calls(2).await;

    pipeline.shutdown().await;

    assert!(matches!(task.await.unwrap(), Err(Error::Cancelled)));
    let events = drain_events(&mut events);
    assert!(events.contains(&Event::Cancelled));
    assert_eq!(events.last(), Some(&Event::Shutdown));
}

#[tokio::test]
async fn test_shutdown_when_idle_only_emits_event() {
    let (pipeline, _runner, _temp_dir) = create_test_pipeline([]);
    let mut events = pipeline.subscribe();

    pipeline.shutdown().await;

    assert_eq!(drain_events(&mut events), vec![Event::Shutdown]);
    assert_eq!(pipeline.state().await, PipelineState::Idle);
}
