//! Deferred work: typed job payloads, the queue they travel through and the
//! worker pool that executes them.
//!
//! Delivery is at-least-once inside one process. Handlers re-check state
//! before acting, so a duplicate or late job is a no-op.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::database::Store;
use crate::services::error::ServiceError;
use crate::services::membership::MembershipService;
use crate::services::sessions::SessionService;
use crate::types::JoinStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Close a test session once its time runs out
    FinishTestSession { session: Uuid },
    /// Apply a moderator's approve/reject decision to a join request
    ApplyJoinDecision { request_id: Uuid, status: JoinStatus },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job queue is closed")]
    Closed,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Schedule `job` to run after `delay` (immediately for `Duration::ZERO`)
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<(), JobError>;
}

/// In-process queue backed by a bounded tokio channel
#[derive(Clone)]
pub struct TokioJobQueue {
    sender: mpsc::Sender<Job>,
}

pub type JobReceiver = mpsc::Receiver<Job>;

impl TokioJobQueue {
    pub fn channel(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<(), JobError> {
        if delay.is_zero() {
            return self.sender.send(job).await.map_err(|_| JobError::Closed);
        }

        let sender = self.sender.clone();
        debug!("Scheduling {:?} in {:?}", job, delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(job).await.is_err() {
                error!("Job queue closed before a delayed job could be delivered");
            }
        });
        Ok(())
    }
}

/// Queue that only records what was enqueued. Tests drain it by hand.
#[derive(Default)]
pub struct ManualJobQueue {
    jobs: std::sync::Mutex<Vec<(Job, Duration)>>,
}

impl ManualJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued since the last call, in order
    pub fn take(&self) -> Vec<(Job, Duration)> {
        match self.jobs.lock() {
            Ok(mut jobs) => std::mem::take(&mut *jobs),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Run every recorded job through `handler`, ignoring delays
    pub async fn run_pending(&self, handler: &JobHandler) {
        for (job, _) in self.take() {
            handler.handle(job).await;
        }
    }
}

#[async_trait]
impl JobQueue for ManualJobQueue {
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<(), JobError> {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push((job, delay)),
            Err(poisoned) => poisoned.into_inner().push((job, delay)),
        }
        Ok(())
    }
}

/// Executes jobs against the services. Every branch is idempotent.
#[derive(Clone)]
pub struct JobHandler {
    sessions: SessionService,
    membership: MembershipService,
}

impl JobHandler {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            sessions: SessionService::new(store.clone(), queue.clone()),
            membership: MembershipService::new(store, queue),
        }
    }

    pub async fn handle(&self, job: Job) {
        let result = match &job {
            Job::FinishTestSession { session } => self.sessions.finish_by_job(*session).await,
            Job::ApplyJoinDecision { request_id, status } => {
                self.membership.apply_join_decision(*request_id, *status).await
            }
        };

        // Failed jobs are logged and dropped; the expiry sweep covers lost session jobs
        if let Err(e) = result {
            error!("Job {:?} failed: {}", job, e);
        }
    }
}

/// Start `workers` tasks that pull from one shared receiver until the queue closes
pub fn spawn_workers(workers: usize, receiver: JobReceiver, handler: JobHandler) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..workers.max(1))
        .map(|id| {
            let receiver = receiver.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    match next {
                        Some(job) => {
                            debug!("Worker {} picked up {:?}", id, job);
                            handler.handle(job).await;
                        }
                        None => break,
                    }
                }
                info!("Job worker {} stopped", id);
            })
        })
        .collect()
}

/// Periodically finish sessions whose deadline passed without their job running
pub fn spawn_sweeper(sessions: SessionService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match sessions.sweep_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Expiry sweep finished {} session(s)", n),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_serialize_with_a_type_tag() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Job::FinishTestSession { session: id }).unwrap();
        assert_eq!(json["type"], "finish_test_session");
        assert_eq!(json["session"], id.to_string());
    }

    #[tokio::test]
    async fn immediate_jobs_arrive_in_order() {
        let (queue, mut rx) = TokioJobQueue::channel(8);
        let a = Job::FinishTestSession { session: Uuid::new_v4() };
        let b = Job::FinishTestSession { session: Uuid::new_v4() };
        queue.enqueue(a.clone(), Duration::ZERO).await.unwrap();
        queue.enqueue(b.clone(), Duration::ZERO).await.unwrap();
        assert_eq!(rx.recv().await, Some(a));
        assert_eq!(rx.recv().await, Some(b));
    }

    #[tokio::test]
    async fn delayed_jobs_arrive_after_the_delay() {
        let (queue, mut rx) = TokioJobQueue::channel(8);
        let job = Job::FinishTestSession { session: Uuid::new_v4() };
        queue.enqueue(job.clone(), Duration::from_millis(20)).await.unwrap();
        assert!(rx.try_recv().is_err());
        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(got, Some(job));
    }

    #[tokio::test]
    async fn manual_queue_records_jobs() {
        let queue = ManualJobQueue::new();
        let job = Job::ApplyJoinDecision { request_id: Uuid::new_v4(), status: JoinStatus::Approved };
        queue.enqueue(job.clone(), Duration::ZERO).await.unwrap();
        assert_eq!(queue.take(), vec![(job, Duration::ZERO)]);
        assert!(queue.take().is_empty());
    }
}
