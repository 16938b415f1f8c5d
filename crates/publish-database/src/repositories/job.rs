//! PostgreSQL job store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use publish_core::error::{AppError, ErrorKind};
use publish_core::result::AppResult;
use publish_core::types::{DeleteItemId, FileItemId, ItemRef, JobId};
use publish_entity::{DeleteItem, FileItem, Job, NewJob};

use crate::connection::DatabasePool;
use crate::store::{
    ClaimRequest, CompletedJob, ItemUpdate, JobStore, OutstandingCounts, ScheduledJob,
};

const FIND_JOB_SQL: &str = "SELECT id, collection_id, collection_path, schedule_time, \
     start_time, complete_time FROM publish_job WHERE id = $1";

/// Claims due jobs and, when `$2` is set, started jobs that have been quiet
/// since `$2`. Row locks are skipped so concurrent claimants partition the
/// due set instead of blocking on it.
const CLAIM_DUE_SQL: &str = "\
UPDATE publish_job SET start_time = $1 \
WHERE id IN ( \
    SELECT j.id FROM publish_job j \
    WHERE j.complete_time IS NULL \
      AND j.schedule_time <= $1 \
      AND (j.start_time IS NULL \
           OR ($2::BIGINT IS NOT NULL \
               AND j.start_time <= $2 \
               AND NOT EXISTS (SELECT 1 FROM publish_file f \
                               WHERE f.job_id = j.id AND f.complete_time > $2) \
               AND NOT EXISTS (SELECT 1 FROM publish_delete d \
                               WHERE d.job_id = j.id AND d.complete_time > $2))) \
    ORDER BY j.schedule_time, j.id \
    LIMIT $3 \
    FOR UPDATE SKIP LOCKED) \
RETURNING id, collection_id, collection_path, schedule_time, start_time, complete_time";

const FIND_COMPLETABLE_SQL: &str = "\
SELECT j.id FROM publish_job j \
WHERE j.start_time IS NOT NULL AND j.complete_time IS NULL \
  AND NOT EXISTS (SELECT 1 FROM publish_file f \
                  WHERE f.job_id = j.id AND f.complete_time IS NULL) \
  AND NOT EXISTS (SELECT 1 FROM publish_delete d \
                  WHERE d.job_id = j.id AND d.complete_time IS NULL) \
ORDER BY j.id";

/// Repository for publish jobs and their items.
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: DatabasePool,
}

impl JobRepository {
    /// Create a job repository over a connected pool.
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

#[async_trait]
impl JobStore for JobRepository {
    fn provider_type(&self) -> &str {
        "postgres"
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.db.health_check().await
    }

    async fn close(&self) {
        self.db.close().await;
    }

    async fn schedule(&self, job: &NewJob) -> AppResult<ScheduledJob> {
        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let inserted: Option<JobId> = sqlx::query_scalar(
            "INSERT INTO publish_job (collection_id, collection_path, schedule_time) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (collection_id, schedule_time) WHERE complete_time IS NULL DO NOTHING \
             RETURNING id",
        )
        .bind(&job.collection_id)
        .bind(&job.collection_path)
        .bind(job.schedule_time)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert job", e))?;

        let Some(job_id) = inserted else {
            let existing: Option<JobId> = sqlx::query_scalar(
                "SELECT id FROM publish_job \
                 WHERE collection_id = $1 AND schedule_time = $2 AND complete_time IS NULL",
            )
            .bind(&job.collection_id)
            .bind(job.schedule_time)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find existing job", e)
            })?;

            let job_id = existing.ok_or_else(|| {
                AppError::conflict(format!(
                    "Job for collection '{}' at {} conflicted but could not be found",
                    job.collection_id, job.schedule_time
                ))
            })?;
            debug!(job_id = %job_id, collection_id = %job.collection_id, "Job already admitted");
            return Ok(ScheduledJob {
                job_id,
                created: false,
                file_ids: Vec::new(),
                delete_ids: Vec::new(),
            });
        };

        let mut file_ids = Vec::with_capacity(job.files.len());
        for file in &job.files {
            let id: FileItemId = sqlx::query_scalar(
                "INSERT INTO publish_file (job_id, uri, file_location) VALUES ($1, $2, $3) \
                 RETURNING id",
            )
            .bind(job_id)
            .bind(&file.uri)
            .bind(&file.location)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert file item", e))?;
            file_ids.push(id);
        }

        let mut delete_ids = Vec::with_capacity(job.deletes.len());
        for uri in &job.deletes {
            let id: DeleteItemId = sqlx::query_scalar(
                "INSERT INTO publish_delete (job_id, uri) VALUES ($1, $2) RETURNING id",
            )
            .bind(job_id)
            .bind(uri)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to insert delete item", e)
            })?;
            delete_ids.push(id);
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit job", e)
        })?;

        Ok(ScheduledJob {
            job_id,
            created: true,
            file_ids,
            delete_ids,
        })
    }

    async fn cancel(&self, collection_id: &str, schedule_time: i64) -> AppResult<Vec<JobId>> {
        sqlx::query_scalar(
            "DELETE FROM publish_job \
             WHERE collection_id = $1 AND schedule_time = $2 AND start_time IS NULL \
             RETURNING id",
        )
        .bind(collection_id)
        .bind(schedule_time)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to cancel job", e))
    }

    async fn claim_due(&self, request: ClaimRequest) -> AppResult<Vec<Job>> {
        let mut jobs = sqlx::query_as::<_, Job>(CLAIM_DUE_SQL)
            .bind(request.now)
            .bind(request.restart_before)
            .bind(request.limit.map(i64::from))
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim due jobs", e))?;
        // RETURNING does not preserve the subquery order.
        jobs.sort_by_key(|job| (job.schedule_time, job.id));
        Ok(jobs)
    }

    async fn outstanding_files(&self, job_id: JobId) -> AppResult<Vec<FileItem>> {
        sqlx::query_as::<_, FileItem>(
            "SELECT id, job_id, uri, file_location, complete_time FROM publish_file \
             WHERE job_id = $1 AND complete_time IS NULL ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load file items", e))
    }

    async fn outstanding_deletes(&self, job_id: JobId) -> AppResult<Vec<DeleteItem>> {
        sqlx::query_as::<_, DeleteItem>(
            "SELECT id, job_id, uri, complete_time FROM publish_delete \
             WHERE job_id = $1 AND complete_time IS NULL ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load delete items", e))
    }

    async fn complete_item(
        &self,
        job_id: JobId,
        item: ItemRef,
        now: i64,
    ) -> AppResult<ItemUpdate> {
        let sql = match item {
            ItemRef::File(_) => {
                "UPDATE publish_file SET complete_time = $3 \
                 WHERE id = $1 AND job_id = $2 AND complete_time IS NULL"
            }
            ItemRef::Delete(_) => {
                "UPDATE publish_delete SET complete_time = $3 \
                 WHERE id = $1 AND job_id = $2 AND complete_time IS NULL"
            }
        };

        let result = sqlx::query(sql)
            .bind(item.raw_id())
            .bind(job_id)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, format!("Failed to complete {item}"), e)
            })?;

        Ok(if result.rows_affected() > 0 {
            ItemUpdate::Recorded
        } else {
            ItemUpdate::Unchanged
        })
    }

    async fn find_completable(&self) -> AppResult<Vec<JobId>> {
        sqlx::query_scalar(FIND_COMPLETABLE_SQL)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find completable jobs", e)
            })
    }

    async fn complete_job(&self, job_id: JobId, now: i64) -> AppResult<Option<CompletedJob>> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "UPDATE publish_job SET complete_time = $2 \
             WHERE id = $1 AND start_time IS NOT NULL AND complete_time IS NULL \
             RETURNING collection_id, start_time",
        )
        .bind(job_id)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete job", e))?;

        Ok(row.map(|(collection_id, start_time)| CompletedJob {
            job_id,
            collection_id,
            start_time,
            complete_time: now,
        }))
    }

    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(FIND_JOB_SQL)
            .bind(job_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    async fn outstanding_counts(&self, job_id: JobId) -> AppResult<OutstandingCounts> {
        let (files, deletes): (i64, i64) = sqlx::query_as(
            "SELECT \
               (SELECT COUNT(*) FROM publish_file WHERE job_id = $1 AND complete_time IS NULL), \
               (SELECT COUNT(*) FROM publish_delete WHERE job_id = $1 AND complete_time IS NULL)",
        )
        .bind(job_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count items", e))?;

        Ok(OutstandingCounts { files, deletes })
    }
}
