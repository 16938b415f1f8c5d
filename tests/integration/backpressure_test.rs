//! Per-tick claim cap.

use std::collections::HashSet;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use publish_core::config::SchedulerConfig;
use publish_core::types::time::{NANOS_PER_SECOND, now_nanos};
use publish_database::{JobStore, MemoryJobStore};
use publish_entity::{JobState, NewJob};
use publish_secrets::StaticSecretResolver;
use publish_worker::ClaimPoller;

use crate::helpers::{self, TestPipeline};

async fn schedule_due(store: &MemoryJobStore, count: usize, now: i64) {
    for i in 0..count {
        store
            .schedule(&NewJob {
                collection_id: format!("bulk-{i:02}"),
                collection_path: format!("/collections/bulk-{i:02}"),
                schedule_time: now - (count - i) as i64 * NANOS_PER_SECOND,
                files: Vec::new(),
                deletes: vec![format!("/bulk-{i:02}")],
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_twenty_five_due_jobs_take_two_ticks() {
    let store = Arc::new(MemoryJobStore::new());
    let now = now_nanos();
    schedule_due(&store, 25, now).await;

    let config = SchedulerConfig {
        max_launch_per_tick: 20,
        ..SchedulerConfig::default()
    };
    let (queue_tx, mut queue_rx) = mpsc::channel(64);
    let poller = ClaimPoller::new(
        store.clone(),
        Arc::new(StaticSecretResolver::new(HashMap::new())),
        config,
        queue_tx,
    );

    assert_eq!(poller.tick_at(now).await.unwrap(), 20);
    let mut first = Vec::new();
    while let Ok(job) = queue_rx.try_recv() {
        first.push(job.job.collection_id.clone());
    }
    assert_eq!(first.len(), 20);
    assert_eq!(first.first().map(String::as_str), Some("bulk-00"));
    assert_eq!(first.last().map(String::as_str), Some("bulk-19"));

    assert_eq!(poller.tick_at(now + 1).await.unwrap(), 5);
    let mut second = Vec::new();
    while let Ok(job) = queue_rx.try_recv() {
        assert_eq!(job.job.state(), JobState::Started);
        second.push(job.job.collection_id.clone());
    }
    assert_eq!(second.len(), 5);
    assert!(second.iter().all(|c| !first.contains(c)));

    assert_eq!(poller.tick_at(now + 2).await.unwrap(), 0);
}

#[tokio::test]
async fn test_capped_pipeline_still_dispatches_every_job() {
    let store = Arc::new(MemoryJobStore::new());
    schedule_due(&store, 25, now_nanos()).await;

    let mut config = helpers::test_config();
    config.scheduler.max_launch_per_tick = 20;
    let mut pipeline = TestPipeline::start_with_store(config, store);

    let mut jobs = HashSet::new();
    for _ in 0..25 {
        let delete = pipeline.next_delete().await;
        assert!(jobs.insert(delete.schedule_id), "job dispatched twice");
        pipeline.ack_delete(&delete).await;
    }

    let mut completed = HashSet::new();
    for _ in 0..25 {
        completed.insert(pipeline.next_complete().await.schedule_id);
    }
    assert_eq!(completed, jobs);

    pipeline.stop().await.unwrap();
}
