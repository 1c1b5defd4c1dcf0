use crate::pipeline::{BulkJob, JobOutcome, Pipeline};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Working,
    Completed,
    Error,
    Cancelled,
}

/// Terminal states accepted by [`JobController::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Completed,
    Error,
    Cancelled,
}

impl From<FinalStatus> for JobStatus {
    fn from(value: FinalStatus) -> Self {
        match value {
            FinalStatus::Completed => JobStatus::Completed,
            FinalStatus::Error => JobStatus::Error,
            FinalStatus::Cancelled => JobStatus::Cancelled,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("a job is already running")]
    Busy,
    #[error("job worker is not available")]
    WorkerUnavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub current: usize,
    pub total: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    current: usize,
    total: usize,
    message: String,
    job_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    in_flight: bool,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            status: JobStatus::Idle,
            current: 0,
            total: 0,
            message: String::new(),
            job_id: None,
            started_at: None,
            finished_at: None,
            in_flight: false,
        }
    }
}

/// Process-wide progress of the one job that may run at a time.
///
/// Status moves `idle -> working -> completed | error | cancelled` and stays
/// terminal until the next job starts. The cancel flag lives outside the
/// mutex so it can be raised without waiting on the worker.
#[derive(Clone, Default)]
pub struct JobController {
    state: Arc<Mutex<JobState>>,
    cancel: Arc<AtomicBool>,
}

impl JobController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the slot for a job that is about to be queued. A cancel
    /// requested after this point is honored once the job starts.
    pub async fn claim(&self) -> Result<Uuid, JobError> {
        let mut state = self.state.lock().await;
        if state.in_flight || state.status == JobStatus::Working {
            return Err(JobError::Busy);
        }
        let id = Uuid::new_v4();
        self.cancel.store(false, Ordering::SeqCst);
        *state = JobState {
            message: "Job queued".into(),
            job_id: Some(id),
            in_flight: true,
            ..JobState::default()
        };
        Ok(id)
    }

    pub async fn start(&self, total: usize) -> Result<(), JobError> {
        let mut state = self.state.lock().await;
        if state.status == JobStatus::Working {
            return Err(JobError::Busy);
        }
        // Without a prior claim this is a fresh job: nothing may carry over.
        let job_id = if state.in_flight {
            state.job_id
        } else {
            self.cancel.store(false, Ordering::SeqCst);
            Some(Uuid::new_v4())
        };
        *state = JobState {
            status: JobStatus::Working,
            total,
            job_id,
            started_at: Some(Utc::now()),
            in_flight: true,
            ..JobState::default()
        };
        info!(target = "podbulk.jobs", job_id = ?job_id, total, "job started");
        Ok(())
    }

    /// Ignored unless a job is working.
    pub async fn advance(&self, current: usize, message: impl Into<String>) {
        let mut state = self.state.lock().await;
        if state.status != JobStatus::Working {
            return;
        }
        state.current = current.min(state.total);
        state.message = message.into();
    }

    /// Replaces only the message.
    pub async fn note(&self, message: impl Into<String>) {
        self.state.lock().await.message = message.into();
    }

    pub async fn finish(&self, outcome: FinalStatus, message: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.status = outcome.into();
        state.message = message.into();
        state.finished_at = Some(Utc::now());
        state.in_flight = false;
        info!(
            target = "podbulk.jobs",
            job_id = ?state.job_id,
            status = ?state.status,
            current = state.current,
            total = state.total,
            "job finished"
        );
    }

    /// Idempotent; never touches the status.
    pub fn request_cancel(&self) {
        if !self.cancel.swap(true, Ordering::SeqCst) {
            info!(target = "podbulk.jobs", "cancel requested");
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        let state = self.state.lock().await;
        JobSnapshot {
            status: state.status,
            current: state.current,
            total: state.total,
            message: state.message.clone(),
            job_id: state.job_id,
            started_at: state.started_at,
            finished_at: state.finished_at,
            cancel_requested: self.is_cancel_requested(),
        }
    }
}

/// Single background worker fed through a bounded channel.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<BulkJob>,
    controller: JobController,
}

impl JobQueue {
    pub fn spawn(pipeline: Pipeline, controller: JobController) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<BulkJob>(queue_capacity_from_env());
        let worker_controller = controller.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match pipeline.run(job, &worker_controller).await {
                    JobOutcome::Completed { created } => {
                        info!(target = "podbulk.jobs", created = created.len(), "job completed")
                    }
                    JobOutcome::Cancelled { processed } => {
                        info!(target = "podbulk.jobs", processed, "job cancelled")
                    }
                    JobOutcome::Failed(err) => {
                        warn!(target = "podbulk.jobs", stage = err.stage(), error = %err.detail(), "job failed")
                    }
                }
            }
        });

        (Self { tx, controller }, handle)
    }

    pub async fn submit(&self, job: BulkJob) -> Result<Uuid, JobError> {
        let id = self.controller.claim().await?;
        if self.tx.send(job).await.is_err() {
            self.controller
                .finish(FinalStatus::Error, "worker not available")
                .await;
            return Err(JobError::WorkerUnavailable);
        }
        Ok(id)
    }

    pub fn cancel(&self) {
        self.controller.request_cancel();
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        self.controller.snapshot().await
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(4)
}
