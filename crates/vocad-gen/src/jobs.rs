use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use vocad_types::jobs::{JobMode, JobRecord, JobStatus};

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy)]
pub struct JobTrackerConfig {
    /// How long a terminal record stays pollable after it finishes.
    pub completed_ttl: Duration,
    /// Hard cap on tracked records; the oldest terminal records are dropped
    /// first when the cap is hit. Running jobs are never dropped.
    pub max_jobs: usize,
}

impl Default for JobTrackerConfig {
    fn default() -> Self {
        Self {
            completed_ttl: Duration::from_secs(15 * 60),
            max_jobs: 1024,
        }
    }
}

struct JobEntry {
    record: JobRecord,
    created: Instant,
    finished: Option<Instant>,
}

/// Fire-and-forget generation jobs: `submit` returns immediately with an
/// id, a spawned worker drives the orchestrator, callers poll with `get`.
/// Bounded: terminal records expire after a TTL and the map is capped.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    config: JobTrackerConfig,
}

impl JobTracker {
    pub fn new(config: JobTrackerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub async fn submit(
        &self,
        orchestrator: Arc<Orchestrator>,
        mode: JobMode,
        prompt: String,
        userid: Option<String>,
        modelid: Option<String>,
    ) -> Uuid {
        self.evict().await;

        let job_id = Uuid::new_v4();
        let record = JobRecord {
            job_id,
            status: JobStatus::Pending,
            mode,
            prompt: prompt.clone(),
            userid: userid.clone(),
            modelid: modelid.clone(),
            model_id: None,
            scad_code: None,
            error: None,
            trace: None,
            created_at: chrono::Utc::now(),
        };
        self.inner.write().await.insert(
            job_id,
            JobEntry {
                record,
                created: Instant::now(),
                finished: None,
            },
        );

        let tracker = self.clone();
        tokio::spawn(async move {
            tracker.set_status(job_id, JobStatus::Running).await;

            let outcome = match mode {
                JobMode::Generate => orchestrator
                    .generate(&prompt, userid.as_deref(), modelid.clone())
                    .await
                    .map(|(model_id, scad_code)| (Some(model_id), scad_code)),
                JobMode::Iterate => orchestrator
                    .iterate(
                        &prompt,
                        userid.as_deref().unwrap_or_default(),
                        modelid.as_deref().unwrap_or_default(),
                    )
                    .await
                    .map(|scad_code| (modelid.clone(), Some(scad_code))),
            };

            match outcome {
                Ok((model_id, scad_code)) => {
                    tracker.finish_ok(job_id, model_id, scad_code).await;
                }
                Err(e) => {
                    error!("job {} failed: {}", job_id, e);
                    tracker.finish_err(job_id, e.to_string(), format!("{:?}", e)).await;
                }
            }
        });

        job_id
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.inner
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.record.clone())
    }

    async fn set_status(&self, job_id: Uuid, status: JobStatus) {
        if let Some(entry) = self.inner.write().await.get_mut(&job_id) {
            if !entry.record.status.is_terminal() {
                entry.record.status = status;
            }
        }
    }

    async fn finish_ok(&self, job_id: Uuid, model_id: Option<String>, scad_code: Option<String>) {
        if let Some(entry) = self.inner.write().await.get_mut(&job_id) {
            entry.record.model_id = model_id;
            entry.record.scad_code = scad_code;
            entry.record.status = JobStatus::Done;
            entry.finished = Some(Instant::now());
        }
    }

    async fn finish_err(&self, job_id: Uuid, error: String, trace: String) {
        if let Some(entry) = self.inner.write().await.get_mut(&job_id) {
            entry.record.error = Some(error);
            entry.record.trace = Some(trace);
            entry.record.status = JobStatus::Error;
            entry.finished = Some(Instant::now());
        }
    }

    /// Drop expired terminal records, then enforce the cap by dropping the
    /// oldest terminal records.
    async fn evict(&self) {
        let mut jobs = self.inner.write().await;

        let ttl = self.config.completed_ttl;
        jobs.retain(|_, entry| match entry.finished {
            Some(finished) => finished.elapsed() < ttl,
            None => true,
        });

        if jobs.len() >= self.config.max_jobs {
            let mut terminal: Vec<(Uuid, Instant)> = jobs
                .iter()
                .filter(|(_, entry)| entry.record.status.is_terminal())
                .map(|(id, entry)| (*id, entry.created))
                .collect();
            terminal.sort_by_key(|(_, created)| *created);

            let excess = jobs
                .len()
                .saturating_sub(self.config.max_jobs.saturating_sub(1));
            for (id, _) in terminal.into_iter().take(excess) {
                debug!("evicting finished job {}", id);
                jobs.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodeGenerator;
    use crate::router::TextRouter;
    use crate::GenError;
    use async_trait::async_trait;
    use vocad_db::Database;

    struct OkRouter;

    #[async_trait]
    impl TextRouter for OkRouter {
        async fn run(
            &self,
            input: &str,
            _models: &[&str],
            _mcp_servers: &[&str],
        ) -> Result<String, GenError> {
            Ok(input.to_string())
        }
    }

    struct OkCodeGen;

    #[async_trait]
    impl CodeGenerator for OkCodeGen {
        async fn generate(&self, _prompt: &str) -> Result<String, GenError> {
            Ok("cube(1);".to_string())
        }
    }

    struct FailingRouter;

    #[async_trait]
    impl TextRouter for FailingRouter {
        async fn run(
            &self,
            _input: &str,
            _models: &[&str],
            _mcp_servers: &[&str],
        ) -> Result<String, GenError> {
            Err(GenError::Upstream("router unavailable".into()))
        }
    }

    fn working_orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Some(Arc::new(OkRouter) as Arc<dyn TextRouter>),
            Some(Arc::new(OkCodeGen) as Arc<dyn CodeGenerator>),
            None,
            Arc::new(Database::open_in_memory().unwrap()),
        ))
    }

    fn failing_orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Some(Arc::new(FailingRouter) as Arc<dyn TextRouter>),
            Some(Arc::new(OkCodeGen) as Arc<dyn CodeGenerator>),
            None,
            Arc::new(Database::open_in_memory().unwrap()),
        ))
    }

    async fn poll_until_terminal(tracker: &JobTracker, job_id: Uuid) -> JobRecord {
        for _ in 0..200 {
            let record = tracker.get(job_id).await.expect("job exists");
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn generate_job_runs_to_done() {
        let tracker = JobTracker::new(JobTrackerConfig::default());
        let job_id = tracker
            .submit(
                working_orchestrator(),
                JobMode::Generate,
                "a mug".into(),
                Some("u1".into()),
                None,
            )
            .await;

        let initial = tracker.get(job_id).await.unwrap();
        assert!(matches!(
            initial.status,
            JobStatus::Pending | JobStatus::Running | JobStatus::Done
        ));

        let done = poll_until_terminal(&tracker, job_id).await;
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.scad_code.as_deref(), Some("cube(1);"));
        assert!(done.model_id.is_some());
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn failed_job_reports_error_and_stays_terminal() {
        let tracker = JobTracker::new(JobTrackerConfig::default());
        let job_id = tracker
            .submit(
                failing_orchestrator(),
                JobMode::Generate,
                "a mug".into(),
                None,
                None,
            )
            .await;

        let failed = poll_until_terminal(&tracker, job_id).await;
        assert_eq!(failed.status, JobStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("router unavailable"));

        // Terminal state never reverts
        tokio::time::sleep(Duration::from_millis(20)).await;
        let again = tracker.get(job_id).await.unwrap();
        assert_eq!(again.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn expired_terminal_jobs_are_evicted_on_submit() {
        let tracker = JobTracker::new(JobTrackerConfig {
            completed_ttl: Duration::ZERO,
            max_jobs: 1024,
        });

        let first = tracker
            .submit(
                working_orchestrator(),
                JobMode::Generate,
                "a mug".into(),
                None,
                None,
            )
            .await;
        poll_until_terminal(&tracker, first).await;

        let _second = tracker
            .submit(
                working_orchestrator(),
                JobMode::Generate,
                "a bowl".into(),
                None,
                None,
            )
            .await;

        assert!(tracker.get(first).await.is_none());
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let tracker = JobTracker::new(JobTrackerConfig::default());
        assert!(tracker.get(Uuid::new_v4()).await.is_none());
    }
}
