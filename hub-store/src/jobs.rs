//! Job queue: creation, the claim CAS, and the stale-claim recovery sweep.
//!
//! The claim is a single `UPDATE ... WHERE status = 'PENDING'` against the
//! one writer connection (spec.md §9 Open Question: multi-process would
//! need row-level locking instead — out of scope here).

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::types::{Job, JobStatus};

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Claimed => "CLAIMED",
        JobStatus::Running => "RUNNING",
        JobStatus::Succeeded => "SUCCEEDED",
        JobStatus::Failed => "FAILED",
        JobStatus::Skipped => "SKIPPED",
    }
}

impl Store {
    /// Insert a job for `(routine_id, scheduled_for)` if it doesn't already
    /// exist. `(routine_id, scheduled_for)` is unique, so re-expansion is a
    /// no-op per spec.md §4.6.
    pub fn create_pending_job(&self, routine_id: &str, scheduled_for: DateTime<Utc>) -> Result<bool> {
        let job = Job {
            id: Uuid::new_v4().to_string(),
            routine_id: routine_id.to_string(),
            scheduled_for,
            status: JobStatus::Pending,
            attempt_count: 0,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            claimed_at: None,
        };
        let body = serde_json::to_string(&job)?;
        let conn = self.write();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO jobs (id, routine_id, scheduled_for, status, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                job.id,
                job.routine_id,
                job.scheduled_for.timestamp(),
                status_str(job.status),
                body,
                job.created_at.timestamp(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Up to `limit` PENDING jobs due by `now`, for enabled routines.
    /// Enablement isn't re-checked here — the expander only creates jobs
    /// for enabled routines, and a routine disabled after expansion still
    /// runs its already-queued jobs (consistent with "jobs are concrete").
    pub fn due_jobs(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Job>> {
        let conn = self.read();
        let mut stmt = conn.prepare(
            "SELECT body FROM jobs WHERE status = 'PENDING' AND scheduled_for <= ?1
             ORDER BY scheduled_for ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![now.timestamp(), limit], |row| row.get::<_, String>(0))?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(serde_json::from_str(&row?)?);
        }
        Ok(jobs)
    }

    /// Atomically claims a PENDING job. Returns `true` if this caller won
    /// the race — the invariant spec.md §8 tests directly ("exactly one
    /// transitions J to CLAIMED").
    pub fn claim_job(&self, id: &str) -> Result<bool> {
        let now = Utc::now();
        let conn = self.write();
        let body: Option<String> = conn
            .query_row("SELECT body FROM jobs WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        let Some(body) = body else { return Ok(false) };
        let mut job: Job = serde_json::from_str(&body)?;
        job.status = JobStatus::Claimed;
        job.claimed_at = Some(now);
        job.updated_at = now;
        let new_body = serde_json::to_string(&job)?;

        let updated = conn.execute(
            "UPDATE jobs SET status = 'CLAIMED', body = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'PENDING'",
            params![id, new_body, now.timestamp()],
        )?;
        Ok(updated > 0)
    }

    fn save_job(&self, job: &Job) -> Result<()> {
        let body = serde_json::to_string(job)?;
        let conn = self.write();
        conn.execute(
            "UPDATE jobs SET status = ?2, body = ?3, updated_at = ?4, scheduled_for = ?5 WHERE id = ?1",
            params![
                job.id,
                status_str(job.status),
                body,
                job.updated_at.timestamp(),
                job.scheduled_for.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn get_job(&self, id: &str) -> Result<Job> {
        let conn = self.read();
        let body: String = conn
            .query_row("SELECT body FROM jobs WHERE id = ?1", params![id], |row| row.get(0))
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    kind: "job",
                    id: id.to_string(),
                },
                other => StoreError::Database(other),
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn mark_running(&self, id: &str) -> Result<()> {
        let mut job = self.get_job(id)?;
        job.status = JobStatus::Running;
        job.attempt_count += 1;
        job.updated_at = Utc::now();
        self.save_job(&job)
    }

    pub fn mark_succeeded(&self, id: &str) -> Result<()> {
        let mut job = self.get_job(id)?;
        job.status = JobStatus::Succeeded;
        job.updated_at = Utc::now();
        self.save_job(&job)
    }

    pub fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let mut job = self.get_job(id)?;
        job.status = JobStatus::Failed;
        job.last_error = Some(error.to_string());
        job.updated_at = Utc::now();
        self.save_job(&job)
    }

    pub fn mark_skipped(&self, id: &str, reason: &str) -> Result<()> {
        let mut job = self.get_job(id)?;
        job.status = JobStatus::Skipped;
        job.last_error = Some(reason.to_string());
        job.updated_at = Utc::now();
        self.save_job(&job)
    }

    /// Retries a transient failure back to PENDING, or gives up and marks
    /// FAILED once `max_attempts` is reached.
    pub fn retry_or_fail(&self, id: &str, error: &str, max_attempts: u32) -> Result<()> {
        let mut job = self.get_job(id)?;
        job.last_error = Some(error.to_string());
        job.updated_at = Utc::now();
        if job.attempt_count >= max_attempts {
            job.status = JobStatus::Failed;
        } else {
            job.status = JobStatus::Pending;
            job.claimed_at = None;
        }
        self.save_job(&job)
    }

    /// Like [`Store::retry_or_fail`], but pushes `scheduled_for` forward by
    /// `backoff` instead of making the job immediately due again — the
    /// runner computes `backoff` as `2^(attempt-1)` minutes capped at 5min
    /// (spec.md §4.6).
    pub fn retry_or_fail_with_backoff(&self, id: &str, error: &str, max_attempts: u32, backoff: chrono::Duration) -> Result<()> {
        let mut job = self.get_job(id)?;
        job.last_error = Some(error.to_string());
        job.updated_at = Utc::now();
        if job.attempt_count >= max_attempts {
            job.status = JobStatus::Failed;
        } else {
            job.status = JobStatus::Pending;
            job.claimed_at = None;
            job.scheduled_for += backoff;
        }
        self.save_job(&job)
    }

    /// Recovery sweep: CLAIMED jobs whose claim is older than
    /// `stale_claim_timeout` are downgraded back to PENDING (spec.md §4.6
    /// "exactly-once target" — a crash during execution leaves the job
    /// CLAIMED forever otherwise).
    pub fn recover_stale_claims(&self, now: DateTime<Utc>, stale_claim_timeout: chrono::Duration) -> Result<u32> {
        let cutoff = now - stale_claim_timeout;
        let conn = self.write();
        let mut stmt = conn.prepare("SELECT id, body FROM jobs WHERE status = 'CLAIMED'")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let mut recovered = 0;
        for (id, body) in rows {
            let mut job: Job = serde_json::from_str(&body)?;
            if job.claimed_at.map_or(true, |claimed| claimed < cutoff) {
                job.status = JobStatus::Pending;
                job.claimed_at = None;
                job.updated_at = now;
                let new_body = serde_json::to_string(&job)?;
                conn.execute(
                    "UPDATE jobs SET status = 'PENDING', body = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, new_body, now.timestamp()],
                )?;
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pending_job_is_idempotent_per_routine_and_time() {
        let store = Store::open_in_memory().unwrap();
        let at = Utc::now();
        assert!(store.create_pending_job("r1", at).unwrap());
        assert!(!store.create_pending_job("r1", at).unwrap());
    }

    #[test]
    fn only_one_claimer_wins() {
        let store = Store::open_in_memory().unwrap();
        let at = Utc::now();
        store.create_pending_job("r1", at).unwrap();
        let jobs = store.due_jobs(at, 10).unwrap();
        let id = jobs[0].id.clone();

        assert!(store.claim_job(&id).unwrap());
        assert!(!store.claim_job(&id).unwrap());
    }

    #[test]
    fn recover_stale_claims_downgrades_old_claims_only() {
        let store = Store::open_in_memory().unwrap();
        let at = Utc::now() - chrono::Duration::minutes(20);
        store.create_pending_job("r1", at).unwrap();
        let jobs = store.due_jobs(Utc::now(), 10).unwrap();
        let id = jobs[0].id.clone();
        store.claim_job(&id).unwrap();

        let recovered = store
            .recover_stale_claims(Utc::now(), chrono::Duration::minutes(10))
            .unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn retry_or_fail_gives_up_after_max_attempts() {
        let store = Store::open_in_memory().unwrap();
        let at = Utc::now();
        store.create_pending_job("r1", at).unwrap();
        let id = store.due_jobs(at, 10).unwrap()[0].id.clone();
        store.claim_job(&id).unwrap();
        for _ in 0..3 {
            store.mark_running(&id).unwrap();
        }
        store.retry_or_fail(&id, "boom", 3).unwrap();
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn retry_with_backoff_pushes_scheduled_for_forward() {
        let store = Store::open_in_memory().unwrap();
        let at = Utc::now();
        store.create_pending_job("r1", at).unwrap();
        let id = store.due_jobs(at, 10).unwrap()[0].id.clone();
        store.claim_job(&id).unwrap();
        store.mark_running(&id).unwrap();
        store
            .retry_or_fail_with_backoff(&id, "transient", 3, chrono::Duration::minutes(2))
            .unwrap();
        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.scheduled_for > at);
        assert!(store.due_jobs(at, 10).unwrap().is_empty());
    }
}
