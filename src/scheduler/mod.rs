//! Deferred execution: persisted jobs replayed by a polling consumer.
//!
//! A [`ScheduledJob`] captures everything a future render needs: the
//! template, the full execution context as it looked at schedule time,
//! and the target instant. The scheduler polls the job store on a fixed
//! interval, takes up to a batch of due jobs oldest-first, renders each
//! with a fresh evaluator seeded from the captured context, and records
//! the terminal outcome.
//!
//! State machine: pending (`executed = false`) moves to done or failed
//! (`executed = true`, `error` unset/set) exactly once; nothing ever
//! transitions back. There is no retry policy - a failed scheduled render
//! is terminal and its error exists for operator visibility only.
//! Cancellation hard-deletes and is only effective while pending;
//! cancelling a completed job is a silent no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::engine::Engine;

/// One persisted deferred render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub template: String,
    pub context: ExecutionContext,
    pub execute_at: DateTime<Utc>,
    pub executed: bool,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScheduledJob {
    pub fn new(
        guild_id: String,
        channel_id: Option<String>,
        user_id: Option<String>,
        template: String,
        context: ExecutionContext,
        execute_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            guild_id,
            channel_id,
            user_id,
            template,
            context,
            execute_at,
            executed: false,
            executed_at: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.executed
    }
}

/// Timer-driven consumer of due jobs. Shares the engine (and through it
/// the job store) with ad-hoc renders; each job still gets its own
/// evaluator state.
pub struct Scheduler {
    engine: Arc<Engine>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Persists a pending job and returns its id.
    pub async fn schedule_command(
        &self,
        guild_id: &str,
        channel_id: Option<String>,
        user_id: Option<String>,
        template: &str,
        context: ExecutionContext,
        execute_at: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let job = ScheduledJob::new(
            guild_id.to_string(),
            channel_id,
            user_id,
            template.to_string(),
            context,
            execute_at,
        );
        let id = job.id.clone();
        self.engine.collaborators().jobs.insert(&job).await?;
        debug!(job = %id, at = %execute_at, "scheduled job persisted");
        Ok(id)
    }

    /// Hard-deletes a job; only effective while pending. Unknown or
    /// completed ids are a no-op, not an error.
    pub async fn cancel_scheduled_command(&self, job_id: &str) -> anyhow::Result<()> {
        self.engine.collaborators().jobs.delete(job_id).await
    }

    /// One poll pass: fetch due jobs oldest-first and execute each in
    /// isolation. A job's failure - render or bookkeeping - never blocks
    /// the rest of the batch.
    pub async fn run_pass(&self) {
        let now = Utc::now();
        let batch = self.engine.config().poll_batch;
        let due = match self.engine.collaborators().jobs.select_due(now, batch).await {
            Ok(due) => due,
            Err(err) => {
                warn!("scheduler could not fetch due jobs: {err:#}");
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        debug!(jobs = due.len(), "scheduler pass");
        for job in due {
            self.execute_job(job).await;
        }
    }

    async fn execute_job(&self, job: ScheduledJob) {
        let outcome = self.engine.render(&job.template, &job.context).await;
        let finished_at = Utc::now();
        let jobs = &self.engine.collaborators().jobs;

        if outcome.success {
            info!(job = %job.id, guild = %job.guild_id, "scheduled job done");
            if let Err(err) = jobs.mark_done(&job.id, finished_at).await {
                warn!(job = %job.id, "failed to mark job done: {err:#}");
            }
        } else {
            let error = outcome.error.unwrap_or_else(|| "render failed".to_string());
            warn!(job = %job.id, guild = %job.guild_id, %error, "scheduled job failed");
            if let Err(err) = jobs.mark_failed(&job.id, finished_at, &error).await {
                warn!(job = %job.id, "failed to mark job failed: {err:#}");
            }
        }
    }

    /// Spawns the poll loop on the current runtime. The task runs until
    /// the returned handle is aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.engine.config().poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_pass().await;
            }
        })
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestWorld;
    use chrono::Duration;

    #[tokio::test]
    async fn pending_job_round_trip() {
        let world = TestWorld::new();
        let engine = Arc::new(world.engine());
        let scheduler = Scheduler::new(engine.clone());
        let ctx = world.basic_context();

        let before = Utc::now();
        let id = scheduler
            .schedule_command("900", Some("77".into()), Some("42".into()), "hi", ctx, before + Duration::seconds(60))
            .await
            .expect("schedules");

        let pending = world.jobs.pending("900");
        assert_eq!(pending.len(), 1);
        let job = &pending[0];
        assert_eq!(job.id, id);
        assert!(job.is_pending());
        let delta = (job.execute_at - before).num_seconds();
        assert!((59..=61).contains(&delta), "target {delta}s away");
    }

    #[tokio::test]
    async fn cancel_completed_job_is_a_noop() {
        let world = TestWorld::new();
        let engine = Arc::new(world.engine());
        let scheduler = Scheduler::new(engine);
        let ctx = world.basic_context();

        let id = scheduler
            .schedule_command("900", None, None, "done", ctx, Utc::now() - Duration::seconds(1))
            .await
            .expect("schedules");
        scheduler.run_pass().await;
        assert!(world.jobs.pending("900").is_empty());

        // The job already ran; cancelling neither errors nor removes it.
        scheduler.cancel_scheduled_command(&id).await.expect("no-op");
        assert_eq!(world.jobs.all().len(), 1);
        assert!(world.jobs.all()[0].executed);
    }
}
