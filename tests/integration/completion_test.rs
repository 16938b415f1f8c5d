//! Exactly-once completion under interleaved acknowledgements and reaps.

use std::sync::Arc;
use std::time::Duration;

use publish_core::config::TrackerConfig;
use publish_core::messages::{CollectionCompleteMessage, FileResource, ItemAck};
use publish_core::traits::MessageConsumer;
use publish_core::types::ItemRef;
use publish_core::types::time::{NANOS_PER_SECOND, now_nanos};
use publish_database::{ClaimRequest, ItemUpdate, JobStore, MemoryJobStore};
use publish_entity::NewJob;
use publish_worker::CompletionTracker;
use publish_worker::bus::memory_topic;

use crate::helpers::{self, KEYED_COLLECTION, TestPipeline};

#[tokio::test]
async fn test_interleaved_acks_and_reaps_complete_once() {
    let store = Arc::new(MemoryJobStore::new());
    let now = now_nanos();
    let scheduled = store
        .schedule(&NewJob {
            collection_id: "c7".to_string(),
            collection_path: "/collections/c7".to_string(),
            schedule_time: now - NANOS_PER_SECOND,
            files: (0..6)
                .map(|i| FileResource {
                    location: format!("s3://src/{i}"),
                    uri: format!("/{i}"),
                })
                .collect(),
            deletes: (0..4).map(|i| format!("/old/{i}")).collect(),
        })
        .await
        .unwrap();
    store.claim_due(ClaimRequest::at(now)).await.unwrap();

    let (events, mut events_rx) = memory_topic("publish.collection-complete", 64);
    let tracker = CompletionTracker::new(store.clone(), Arc::new(events), TrackerConfig::default());

    let mut items: Vec<ItemRef> = scheduled.file_ids.iter().map(|id| ItemRef::File(*id)).collect();
    items.extend(scheduled.delete_ids.iter().map(|id| ItemRef::Delete(*id)));
    items.reverse();

    let mut tasks = tokio::task::JoinSet::new();
    for (i, item) in items.into_iter().enumerate() {
        let ack = ItemAck {
            job_id: scheduled.job_id,
            item,
            collection_id: "c7".to_string(),
        };
        for _ in 0..2 {
            let tracker = tracker.clone();
            let ack = ack.clone();
            tasks.spawn(async move {
                tracker.mark_item_complete(&ack, now + i as i64).await.unwrap();
                tracker.reap_at(now + 100).await.unwrap().len()
            });
        }
        let reaper = tracker.clone();
        tasks.spawn(async move { reaper.reap_at(now + 100).await.unwrap().len() });
    }

    let mut completed = 0;
    while let Some(joined) = tasks.join_next().await {
        completed += joined.unwrap();
    }
    completed += tracker.reap_at(now + 200).await.unwrap().len();
    assert_eq!(completed, 1);

    let event = events_rx.next().await.unwrap().unwrap();
    let event: CollectionCompleteMessage = serde_json::from_slice(event.data()).unwrap();
    assert_eq!(event.schedule_id, scheduled.job_id);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), events_rx.next())
            .await
            .is_err()
    );

    let job = store.find_job(scheduled.job_id).await.unwrap().unwrap();
    assert_eq!(job.complete_time, Some(now + 100));
}

#[tokio::test]
async fn test_duplicate_ack_is_unchanged() {
    let store = Arc::new(MemoryJobStore::new());
    let now = now_nanos();
    let scheduled = store
        .schedule(&NewJob {
            collection_id: "c8".to_string(),
            collection_path: String::new(),
            schedule_time: now,
            files: Vec::new(),
            deletes: vec!["/x".to_string(), "/y".to_string()],
        })
        .await
        .unwrap();
    store.claim_due(ClaimRequest::at(now)).await.unwrap();

    let (events, _events_rx) = memory_topic("publish.collection-complete", 4);
    let tracker = CompletionTracker::new(store.clone(), Arc::new(events), TrackerConfig::default());
    let ack = ItemAck {
        job_id: scheduled.job_id,
        item: ItemRef::Delete(scheduled.delete_ids[0]),
        collection_id: "c8".to_string(),
    };

    assert_eq!(tracker.mark_item_complete(&ack, now + 1).await.unwrap(), ItemUpdate::Recorded);
    assert_eq!(tracker.mark_item_complete(&ack, now + 2).await.unwrap(), ItemUpdate::Unchanged);
    assert!(tracker.reap_at(now + 3).await.unwrap().is_empty());
    assert_eq!(store.outstanding_counts(scheduled.job_id).await.unwrap().total(), 1);
}

#[tokio::test]
async fn test_redelivered_acks_over_bus_complete_once() {
    let mut pipeline = TestPipeline::start(helpers::test_config());
    pipeline
        .schedule(
            KEYED_COLLECTION,
            helpers::now_seconds() - 1,
            &[("s3://src/a", "/a"), ("s3://src/b", "/b")],
            &["/old"],
        )
        .await;

    let a = pipeline.next_file().await;
    let b = pipeline.next_file().await;
    let delete = pipeline.next_delete().await;

    let mut offsets = Vec::new();
    for _ in 0..3 {
        offsets.push(pipeline.ack_file(&b).await);
        offsets.push(pipeline.ack_delete(&delete).await);
        offsets.push(pipeline.ack_file(&a).await);
    }

    let complete = pipeline.next_complete().await;
    assert_eq!(complete.schedule_id, a.schedule_id);
    for offset in offsets {
        TestPipeline::wait_committed(&pipeline.ack_commits, offset).await;
    }
    pipeline.assert_no_complete(Duration::from_millis(200)).await;

    pipeline.stop().await.unwrap();
}
