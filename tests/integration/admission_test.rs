//! Schedule and cancel requests arriving over the bus.

use std::time::Duration;

use publish_database::JobStore;
use publish_entity::JobState;

use crate::helpers::{self, KEYED_COLLECTION, TestPipeline};

#[tokio::test]
async fn test_cancel_before_claim_removes_job() {
    let pipeline = TestPipeline::start(helpers::test_config());
    let later = helpers::now_seconds() + 3600;

    let scheduled = pipeline
        .schedule("c9", later, &[("s3://src/a", "/a")], &["/gone"])
        .await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, scheduled).await;
    assert_eq!(pipeline.store.job_count(), 1);

    let cancelled = pipeline.cancel("c9", later).await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, cancelled).await;
    assert_eq!(pipeline.store.job_count(), 0);

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_for_other_time_leaves_job() {
    let pipeline = TestPipeline::start(helpers::test_config());
    let later = helpers::now_seconds() + 3600;

    pipeline.schedule("c9", later, &[], &[]).await;
    let cancelled = pipeline.cancel("c9", later + 1).await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, cancelled).await;
    assert_eq!(pipeline.store.job_count(), 1);

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_after_claim_does_not_stop_publish() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    let due = helpers::now_seconds() - 1;

    pipeline
        .schedule(KEYED_COLLECTION, due, &[("s3://src/a", "/a")], &["/old"])
        .await;
    let file = pipeline.next_file().await;

    let cancelled = pipeline.cancel(KEYED_COLLECTION, due).await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, cancelled).await;

    let job = pipeline.store.find_job(file.schedule_id).await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Started);

    let delete = pipeline.next_delete().await;
    pipeline.ack_file(&file).await;
    pipeline.ack_delete(&delete).await;
    let complete = pipeline.next_complete().await;
    assert_eq!(complete.schedule_id, file.schedule_id);

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_redelivered_schedule_admits_one_job() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    let due = helpers::now_seconds() - 1;

    pipeline.schedule(KEYED_COLLECTION, due, &[("s3://src/a", "/a")], &[]).await;
    let again = pipeline
        .schedule(KEYED_COLLECTION, due, &[("s3://src/a", "/a")], &[])
        .await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, again).await;
    assert_eq!(pipeline.store.job_count(), 1);

    let file = pipeline.next_file().await;
    pipeline.ack_file(&file).await;
    pipeline.next_complete().await;
    pipeline.assert_no_complete(Duration::from_millis(150)).await;

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_same_collection_reschedules_after_completion() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    let due = helpers::now_seconds() - 1;

    pipeline.schedule(KEYED_COLLECTION, due, &[], &[]).await;
    let first = pipeline.next_complete().await;

    pipeline.schedule(KEYED_COLLECTION, due, &[], &[]).await;
    let second = pipeline.next_complete().await;
    assert_ne!(first.schedule_id, second.schedule_id);

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_non_numeric_schedule_time_is_dropped() {
    let pipeline = TestPipeline::start(helpers::test_config());
    let offset = pipeline
        .send_raw_schedule(
            br#"{"collectionId": "c1", "scheduleTime": "tomorrow", "action": "schedule"}"#
                .to_vec(),
        )
        .await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, offset).await;
    assert_eq!(pipeline.store.job_count(), 0);

    pipeline.stop().await.unwrap();
}
