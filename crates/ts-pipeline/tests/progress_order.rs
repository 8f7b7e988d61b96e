//! Progress reported for a job never goes backwards.

mod common;

use std::time::Duration;

use common::*;
use ts_core::{Origin, OutputFormat};
use ts_pipeline::JobPhase;

#[tokio::test]
async fn regressing_tool_progress_is_reported_non_decreasing() {
    let h = Harness::new(
        FakeFetcher::new(SOURCE, FetchMode::Serve),
        FakeInspector::new(h264_aac_mp4()),
        FakeTransformer::new(&[5, 40, 30, 70, 65, 100, 90]),
        RecordingUploader::new(),
    );
    let mut ticket = h
        .queue
        .submit(Origin::from("chat-1"), "https://example.com/v", OutputFormat::Mp3)
        .unwrap();
    let phase = tokio::time::timeout(Duration::from_secs(5), ticket.wait())
        .await
        .unwrap();
    assert_eq!(phase, JobPhase::Completed);

    let percents: Vec<u8> = h
        .progress
        .events
        .lock()
        .iter()
        .map(|(_, _, event)| event.percent)
        .collect();
    assert_eq!(percents, vec![5, 40, 40, 70, 70, 100, 100]);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn progress_restarts_for_each_job() {
    let h = Harness::new(
        FakeFetcher::new(SOURCE, FetchMode::Serve),
        FakeInspector::new(h264_aac_mp4()),
        FakeTransformer::new(&[50, 100]),
        RecordingUploader::new(),
    );
    let origin = Origin::from("chat-1");
    for _ in 0..2 {
        let mut ticket = h
            .queue
            .submit(origin.clone(), "https://example.com/v", OutputFormat::Mp3)
            .unwrap();
        assert_eq!(ticket.wait().await, JobPhase::Completed);
    }

    let events = h.progress.events.lock();
    let percents: Vec<u8> = events.iter().map(|(_, _, e)| e.percent).collect();
    assert_eq!(percents, vec![50, 100, 50, 100]);
    // Each pair belongs to a different job.
    assert_ne!(events[0].0, events[2].0);
}
