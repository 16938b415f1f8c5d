//! End-to-end runs of the whole pipeline.

use std::collections::HashSet;
use std::time::Duration;

use publish_core::traits::MessageConsumer;
use publish_database::JobStore;
use publish_entity::JobState;

use crate::helpers::{self, KEYED_COLLECTION, TEST_KEY, TestPipeline};

#[tokio::test]
async fn test_collection_publishes_and_completes_once() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    let due = helpers::now_seconds() - 1;
    pipeline
        .schedule(
            KEYED_COLLECTION,
            due,
            &[("s3://src/a", "/a"), ("s3://src/b", "/b"), ("s3://src/c", "/c")],
            &["/old"],
        )
        .await;

    let mut files = Vec::new();
    for _ in 0..3 {
        files.push(pipeline.next_file().await);
    }
    let delete = pipeline.next_delete().await;

    let job_id = delete.schedule_id;
    assert!(files.iter().all(|f| f.schedule_id == job_id));
    assert!(files.iter().all(|f| f.encryption_key == TEST_KEY));
    assert!(files.iter().all(|f| f.collection_path == "/collections/c1"));
    let published: HashSet<(&str, &str)> = files
        .iter()
        .map(|f| (f.file_location.as_str(), f.uri.as_str()))
        .collect();
    assert_eq!(
        published,
        HashSet::from([("s3://src/a", "/a"), ("s3://src/b", "/b"), ("s3://src/c", "/c")])
    );
    assert_eq!(delete.uri, "/old");
    assert_eq!(delete.collection_id, KEYED_COLLECTION);

    for file in &files {
        pipeline.ack_file(file).await;
    }
    pipeline.ack_delete(&delete).await;

    let complete = pipeline.next_complete().await;
    assert_eq!(complete.schedule_id, job_id);
    assert_eq!(complete.collection_id, KEYED_COLLECTION);
    pipeline.assert_no_complete(Duration::from_millis(200)).await;

    let job = pipeline.store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Completed);
    assert!(job.complete_time >= job.start_time);

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_future_job_waits() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    let offset = pipeline
        .schedule("later", helpers::now_seconds() + 3600, &[("s3://src/a", "/a")], &[])
        .await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, offset).await;
    assert_eq!(pipeline.store.job_count(), 1);

    let early = tokio::time::timeout(Duration::from_millis(150), pipeline.publish_file.next()).await;
    assert!(early.is_err(), "job dispatched before its schedule time");

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_collection_gets_empty_key() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    pipeline
        .schedule("unkeyed", helpers::now_seconds() - 1, &[("s3://src/a", "/a")], &[])
        .await;

    let file = pipeline.next_file().await;
    assert_eq!(file.collection_id, "unkeyed");
    assert_eq!(file.encryption_key, "");

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_empty_collection_completes_without_items() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    pipeline.schedule("empty", helpers::now_seconds() - 1, &[], &[]).await;

    let complete = pipeline.next_complete().await;
    assert_eq!(complete.collection_id, "empty");
    pipeline.assert_no_complete(Duration::from_millis(150)).await;

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_messages_do_not_stop_pipeline() {
    let mut pipeline = TestPipeline::start(helpers::test_config());

    let garbage = pipeline.send_raw_schedule(b"{not json".to_vec()).await;
    let missing_id = pipeline
        .send_raw_schedule(br#"{"collectionId": "", "scheduleTime": "1", "action": "schedule"}"#.to_vec())
        .await;
    let no_item = pipeline.send_raw_ack(br#"{"scheduleId": 5}"#.to_vec()).await;
    let both_items = pipeline
        .send_raw_ack(br#"{"scheduleId": 5, "fileId": 1, "deleteId": 2}"#.to_vec())
        .await;

    TestPipeline::wait_committed(&pipeline.schedule_commits, garbage).await;
    TestPipeline::wait_committed(&pipeline.schedule_commits, missing_id).await;
    TestPipeline::wait_committed(&pipeline.ack_commits, no_item).await;
    TestPipeline::wait_committed(&pipeline.ack_commits, both_items).await;
    assert_eq!(pipeline.store.job_count(), 0);

    pipeline
        .schedule(KEYED_COLLECTION, helpers::now_seconds() - 1, &[("s3://src/a", "/a")], &[])
        .await;
    let file = pipeline.next_file().await;
    pipeline.ack_file(&file).await;
    assert_eq!(pipeline.next_complete().await.schedule_id, file.schedule_id);

    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_ack_for_unknown_item_is_committed() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    let offset = pipeline
        .send_raw_ack(br#"{"scheduleId": 999, "fileId": 999, "collectionId": "ghost"}"#.to_vec())
        .await;
    TestPipeline::wait_committed(&pipeline.ack_commits, offset).await;
    pipeline.assert_no_complete(Duration::from_millis(100)).await;
    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_store_outage_stops_pipeline() {
    let pipeline = TestPipeline::start(helpers::test_config());
    pipeline.store.set_available(false);
    let err = pipeline.join().await.unwrap_err();
    assert!(err.is_fatal());
}
