//! The scheduled loader chain.
//!
//! A thin stand-in for the surrounding scheduler: a strict linear chain of
//! tasks evaluated once per schedule tick, with a uniform per-task retry
//! policy. Any task failing after its retries halts every downstream task
//! for that run.

mod tasks;


pub use tasks::{
    build_daily_chain, ExtractTask, MoveToStorageTask, SenseCsvTask, WarehouseLoadTask,
    EXTRACT_TASK_ID,
};

use crate::config::ChainConfig;
use crate::context::RunContext;
use crate::errors::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Trait for the units of work in a chain.
#[async_trait]
pub trait Task: Send + Sync + fmt::Debug {
    /// Returns the task's id, also the run-context key it publishes under.
    fn task_id(&self) -> &str;

    /// Executes the task against the run context.
    async fn execute(&self, ctx: &RunContext) -> Result<(), PipelineError>;
}

/// Declarative metadata and retry policy for one chain.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    /// Chain name, surfaced in reports.
    pub name: String,
    /// Chain owner.
    pub owner: String,
    /// Schedule expression, recorded for the surrounding scheduler.
    pub schedule: String,
    /// Whether missed ticks are re-run.
    pub catchup: bool,
    /// Notification recipients.
    pub email: Vec<String>,
    /// Notify on run failure.
    pub email_on_failure: bool,
    /// Notify on task retry.
    pub email_on_retry: bool,
    /// Automatic retries per task after the initial attempt.
    pub retries: usize,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
}

impl ChainSpec {
    /// Creates a spec with the default daily policy.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(name, &ChainConfig::default())
    }

    /// Creates a spec from the chain config.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &ChainConfig) -> Self {
        Self {
            name: name.into(),
            owner: config.owner.clone(),
            schedule: config.schedule.clone(),
            catchup: config.catchup,
            email: config.email.clone(),
            email_on_failure: config.email_on_failure,
            email_on_retry: config.email_on_retry,
            retries: config.retries,
            retry_delay: config.retry_delay(),
        }
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// The final status of one task in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The task completed, possibly after retries.
    Succeeded,
    /// The task failed and its retries are exhausted.
    Failed,
    /// An upstream failure halted the chain before this task ran.
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-task outcome in a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    /// The task id.
    pub task_id: String,
    /// The final status.
    pub status: TaskStatus,
    /// Execution attempts consumed, zero for skipped tasks.
    pub attempts: usize,
    /// The final error for failed tasks.
    pub error: Option<String>,
}

/// The outcome of one chain run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// The chain name.
    pub chain: String,
    /// Per-task outcomes, in chain order.
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    /// True when every task succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| task.status == TaskStatus::Succeeded)
    }

    /// Finds a task's report by id.
    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|task| task.task_id == task_id)
    }
}

/// A strict linear chain of tasks.
#[derive(Debug)]
pub struct TaskChain {
    spec: ChainSpec,
    tasks: Vec<Arc<dyn Task>>,
}

impl TaskChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new(spec: ChainSpec) -> Self {
        Self {
            spec,
            tasks: Vec::new(),
        }
    }

    /// Appends a task, depending on everything already in the chain.
    #[must_use]
    pub fn then(mut self, task: Arc<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    /// The chain's spec.
    #[must_use]
    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /// Runs the chain once, in order.
    ///
    /// Each task gets the spec's retry budget. The first task to exhaust it
    /// fails the run and every later task is reported as skipped.
    pub async fn run(&self, ctx: &RunContext) -> RunReport {
        info!(chain = %self.spec.name, owner = %self.spec.owner, "chain run started");
        let mut reports = Vec::with_capacity(self.tasks.len());
        let mut halted = false;

        for task in &self.tasks {
            if halted {
                reports.push(TaskReport {
                    task_id: task.task_id().to_string(),
                    status: TaskStatus::Skipped,
                    attempts: 0,
                    error: None,
                });
                continue;
            }

            let report = self.run_task(task.as_ref(), ctx).await;
            if report.status == TaskStatus::Failed {
                halted = true;
                if self.spec.email_on_failure {
                    warn!(
                        chain = %self.spec.name,
                        recipients = ?self.spec.email,
                        "failure notification suppressed: no mailer configured"
                    );
                }
            }
            reports.push(report);
        }

        let report = RunReport {
            chain: self.spec.name.clone(),
            tasks: reports,
        };
        info!(chain = %self.spec.name, succeeded = report.succeeded(), "chain run finished");
        report
    }

    async fn run_task(&self, task: &dyn Task, ctx: &RunContext) -> TaskReport {
        let mut attempts = 0;
        loop {
            attempts += 1;
            info!(task = task.task_id(), attempts, "task started");

            match task.execute(ctx).await {
                Ok(()) => {
                    info!(task = task.task_id(), "task succeeded");
                    return TaskReport {
                        task_id: task.task_id().to_string(),
                        status: TaskStatus::Succeeded,
                        attempts,
                        error: None,
                    };
                }
                Err(e) => {
                    if attempts > self.spec.retries {
                        error!(task = task.task_id(), error = %e, "task failed, retries exhausted");
                        return TaskReport {
                            task_id: task.task_id().to_string(),
                            status: TaskStatus::Failed,
                            attempts,
                            error: Some(e.to_string()),
                        };
                    }
                    warn!(
                        task = task.task_id(),
                        error = %e,
                        delay_ms = self.spec.retry_delay.as_millis() as u64,
                        "task failed, retrying"
                    );
                    if self.spec.email_on_retry {
                        warn!(
                            recipients = ?self.spec.email,
                            "retry notification suppressed: no mailer configured"
                        );
                    }
                    tokio::time::sleep(self.spec.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyTask;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct OrderedTask {
        id: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Task for OrderedTask {
        fn task_id(&self) -> &str {
            &self.id
        }

        async fn execute(&self, _ctx: &RunContext) -> Result<(), PipelineError> {
            self.log.lock().push(self.id.clone());
            Ok(())
        }
    }

    fn quick_spec(retries: usize) -> ChainSpec {
        ChainSpec::new("test_chain")
            .with_retries(retries)
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_tasks_run_in_chain_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = TaskChain::new(quick_spec(0))
            .then(Arc::new(OrderedTask { id: "a".into(), log: log.clone() }))
            .then(Arc::new(OrderedTask { id: "b".into(), log: log.clone() }))
            .then(Arc::new(OrderedTask { id: "c".into(), log: log.clone() }));

        let report = chain.run(&RunContext::new()).await;

        assert!(report.succeeded());
        assert_eq!(log.lock().as_slice(), &["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let flaky = Arc::new(FlakyTask::new("flaky", 2));
        let chain = TaskChain::new(quick_spec(2)).then(flaky.clone() as Arc<dyn Task>);

        let report = chain.run(&RunContext::new()).await;

        assert!(report.succeeded());
        let task = report.task("flaky").unwrap();
        assert_eq!(task.attempts, 3);
        assert_eq!(flaky.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_halt_downstream() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = TaskChain::new(quick_spec(2))
            .then(Arc::new(FlakyTask::new("always_failing", usize::MAX)))
            .then(Arc::new(OrderedTask { id: "never".into(), log: log.clone() }));

        let report = chain.run(&RunContext::new()).await;

        assert!(!report.succeeded());
        let failed = report.task("always_failing").unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.attempts, 3); // initial attempt plus two retries
        assert!(failed.error.is_some());

        let skipped = report.task("never").unwrap();
        assert_eq!(skipped.status, TaskStatus::Skipped);
        assert_eq!(skipped.attempts, 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_spec_from_config_defaults() {
        let spec = ChainSpec::new("daily");
        assert_eq!(spec.schedule, "@daily");
        assert_eq!(spec.retries, 2);
        assert_eq!(spec.retry_delay, Duration::from_secs(15));
        assert!(!spec.catchup);
    }
}
