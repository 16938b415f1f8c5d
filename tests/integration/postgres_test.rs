//! Job store tests against a real PostgreSQL.
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.
//! Every test truncates the tables, so they hold a shared lock.

use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, MutexGuard};

use publish_core::config::DatabaseConfig;
use publish_core::error::ErrorKind;
use publish_core::messages::FileResource;
use publish_core::types::ItemRef;
use publish_core::types::time::{NANOS_PER_SECOND, now_nanos};
use publish_database::migration::run_migrations;
use publish_database::{
    ClaimRequest, DatabasePool, ItemUpdate, JobRepository, JobStore, ScheduledJob,
};
use publish_entity::{JobState, NewJob};

fn lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

async fn repository() -> (MutexGuard<'static, ()>, Arc<JobRepository>) {
    let guard = lock().lock().await;
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let config = DatabaseConfig {
        provider: "postgres".to_string(),
        url,
        max_connections: 8,
        min_connections: 1,
        ..DatabaseConfig::default()
    };
    let db = DatabasePool::connect(&config).await.expect("connect");
    run_migrations(db.pool()).await.expect("migrate");
    sqlx::query("TRUNCATE publish_job RESTART IDENTITY CASCADE")
        .execute(db.pool())
        .await
        .expect("truncate");
    (guard, Arc::new(JobRepository::new(db)))
}

fn new_job(collection: &str, schedule_time: i64, files: usize, deletes: usize) -> NewJob {
    NewJob {
        collection_id: collection.to_string(),
        collection_path: format!("/collections/{collection}"),
        schedule_time,
        files: (0..files)
            .map(|i| FileResource {
                location: format!("s3://src/{collection}/{i}"),
                uri: format!("/{collection}/{i}"),
            })
            .collect(),
        deletes: (0..deletes).map(|i| format!("/{collection}/old/{i}")).collect(),
    }
}

async fn complete_all(repo: &JobRepository, scheduled: &ScheduledJob, now: i64) {
    for id in &scheduled.file_ids {
        repo.complete_item(scheduled.job_id, ItemRef::File(*id), now).await.unwrap();
    }
    for id in &scheduled.delete_ids {
        repo.complete_item(scheduled.job_id, ItemRef::Delete(*id), now).await.unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn test_pg_schedule_round_trip() {
    let (_guard, repo) = repository().await;
    let now = now_nanos();
    let job = new_job("c1", now - NANOS_PER_SECOND, 3, 1);
    let scheduled = repo.schedule(&job).await.unwrap();
    assert!(scheduled.created);
    assert_eq!(scheduled.file_ids.len(), 3);
    assert_eq!(scheduled.delete_ids.len(), 1);

    let files = repo.outstanding_files(scheduled.job_id).await.unwrap();
    let mut pairs: Vec<(String, String)> = files
        .iter()
        .map(|f| (f.uri.clone(), f.file_location.clone()))
        .collect();
    pairs.sort();
    let mut expected: Vec<(String, String)> = job
        .files
        .iter()
        .map(|f| (f.uri.clone(), f.location.clone()))
        .collect();
    expected.sort();
    assert_eq!(pairs, expected);
    assert!(files.iter().all(|f| f.complete_time.is_none()));

    let again = repo.schedule(&job).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.job_id, scheduled.job_id);
}

#[tokio::test]
#[ignore]
async fn test_pg_claim_and_reap() {
    let (_guard, repo) = repository().await;
    let now = now_nanos();
    let scheduled = repo.schedule(&new_job("c1", now - NANOS_PER_SECOND, 2, 1)).await.unwrap();
    repo.schedule(&new_job("future", now + 3600 * NANOS_PER_SECOND, 1, 0)).await.unwrap();

    let claimed = repo.claim_due(ClaimRequest::at(now)).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, scheduled.job_id);
    assert_eq!(claimed[0].start_time, Some(now));
    assert!(repo.claim_due(ClaimRequest::at(now + 1)).await.unwrap().is_empty());

    assert!(repo.find_completable().await.unwrap().is_empty());
    complete_all(&repo, &scheduled, now + 2).await;
    assert_eq!(
        repo.complete_item(scheduled.job_id, ItemRef::File(scheduled.file_ids[0]), now + 3)
            .await
            .unwrap(),
        ItemUpdate::Unchanged
    );

    assert_eq!(repo.find_completable().await.unwrap(), vec![scheduled.job_id]);
    let done = repo.complete_job(scheduled.job_id, now + 4).await.unwrap().unwrap();
    assert_eq!(done.collection_id, "c1");
    assert_eq!(done.start_time, now);
    assert!(repo.complete_job(scheduled.job_id, now + 5).await.unwrap().is_none());

    let job = repo.find_job(scheduled.job_id).await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Completed);
}

#[tokio::test]
#[ignore]
async fn test_pg_claim_limit_and_order() {
    let (_guard, repo) = repository().await;
    let now = now_nanos();
    for i in 0..25 {
        repo.schedule(&new_job(&format!("bulk-{i:02}"), now - (25 - i) * NANOS_PER_SECOND, 0, 1))
            .await
            .unwrap();
    }

    let first = repo.claim_due(ClaimRequest::at(now).with_limit(Some(20))).await.unwrap();
    assert_eq!(first.len(), 20);
    assert_eq!(first[0].collection_id, "bulk-00");
    let second = repo.claim_due(ClaimRequest::at(now).with_limit(Some(20))).await.unwrap();
    assert_eq!(second.len(), 5);
    assert_eq!(second[0].collection_id, "bulk-20");
}

#[tokio::test]
#[ignore]
async fn test_pg_concurrent_claims_are_exclusive() {
    let (_guard, repo) = repository().await;
    let now = now_nanos();
    for i in 0..30 {
        repo.schedule(&new_job(&format!("race-{i}"), now - NANOS_PER_SECOND, 0, 0))
            .await
            .unwrap();
    }

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let repo = Arc::clone(&repo);
        tasks.spawn(async move {
            repo.claim_due(ClaimRequest::at(now).with_limit(Some(7)))
                .await
                .unwrap()
        });
    }

    let mut ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        ids.extend(joined.unwrap().into_iter().map(|job| job.id));
    }
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total, "a job was claimed twice");
    assert_eq!(total, 30);
}

#[tokio::test]
#[ignore]
async fn test_pg_cancel_only_before_claim() {
    let (_guard, repo) = repository().await;
    let now = now_nanos();
    let due = now - NANOS_PER_SECOND;
    let later = now + 3600 * NANOS_PER_SECOND;
    let claimed = repo.schedule(&new_job("c1", due, 1, 0)).await.unwrap();
    let pending = repo.schedule(&new_job("c2", later, 2, 2)).await.unwrap();
    repo.claim_due(ClaimRequest::at(now)).await.unwrap();

    assert!(repo.cancel("c1", due).await.unwrap().is_empty());
    assert!(repo.find_job(claimed.job_id).await.unwrap().is_some());

    assert_eq!(repo.cancel("c2", later).await.unwrap(), vec![pending.job_id]);
    assert!(repo.find_job(pending.job_id).await.unwrap().is_none());
    assert_eq!(repo.outstanding_counts(pending.job_id).await.unwrap().total(), 0);
}

#[tokio::test]
#[ignore]
async fn test_pg_restart_gap() {
    let (_guard, repo) = repository().await;
    let now = now_nanos();
    let scheduled = repo
        .schedule(&new_job("c1", now - 120 * NANOS_PER_SECOND, 2, 0))
        .await
        .unwrap();
    repo.claim_due(ClaimRequest::at(now - 60 * NANOS_PER_SECOND)).await.unwrap();
    repo.complete_item(
        scheduled.job_id,
        ItemRef::File(scheduled.file_ids[0]),
        now - 59 * NANOS_PER_SECOND,
    )
    .await
    .unwrap();

    assert!(repo.claim_due(ClaimRequest::at(now)).await.unwrap().is_empty());

    let gap = Some(std::time::Duration::from_secs(90));
    assert!(
        repo.claim_due(ClaimRequest::at(now).with_restart_gap(gap))
            .await
            .unwrap()
            .is_empty()
    );

    let gap = Some(std::time::Duration::from_secs(5));
    let reclaimed = repo
        .claim_due(ClaimRequest::at(now).with_restart_gap(gap))
        .await
        .unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].start_time, Some(now));

    let outstanding = repo.outstanding_files(scheduled.job_id).await.unwrap();
    assert_eq!(outstanding.len(), 1);
    assert_eq!(outstanding[0].id, scheduled.file_ids[1]);
}

#[tokio::test]
#[ignore]
async fn test_pg_close_releases_pool() {
    let (_guard, repo) = repository().await;
    assert!(repo.health_check().await.unwrap());

    repo.close().await;
    let err = repo.health_check().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Database);
}
