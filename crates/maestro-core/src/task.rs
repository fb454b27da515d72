//! Task entity: the six-step execution sequence a deployment drives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ResourceId;

/// One of the six actions in the fixed task sequence. Order is significant
/// and immutable after a deployment is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    CreateAsg,
    WaitForInstanceHealth,
    EnableAsg,
    WaitForElbHealth,
    DisableAsg,
    DeleteAsg,
}

impl Action {
    /// The fixed, ordered task sequence every deployment carries.
    pub const SEQUENCE: [Action; 6] = [
        Action::CreateAsg,
        Action::WaitForInstanceHealth,
        Action::EnableAsg,
        Action::WaitForElbHealth,
        Action::DisableAsg,
        Action::DeleteAsg,
    ];
}

/// Task status. Monotone: never regresses once advanced past `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Terminated,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Terminated)
    }

    /// Whether `self -> next` is a legal, non-regressing transition.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Completed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Terminated)
        )
    }
}

/// Handle to a remote, long-running operation on the cloud-provider façade
/// (the "remote task" tracked by the external-task tracker, C2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTaskRef {
    pub id: String,
    pub url: String,
    pub parameters: std::collections::BTreeMap<String, String>,
}

/// A single append-only log line, `{date, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: DateTime<Utc>,
    pub message: String,
}

/// A task owned by a [`crate::deployment::Deployment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: ResourceId,
    pub action: Action,
    pub status: TaskStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub remote: Option<RemoteTaskRef>,
    pub log: Vec<LogEntry>,
}

impl Task {
    pub fn pending(action: Action) -> Self {
        Self {
            id: ResourceId::new(),
            action,
            status: TaskStatus::Pending,
            start: None,
            end: None,
            remote: None,
            log: Vec::new(),
        }
    }

    /// Mark the task as started (`Pending -> Running`) without touching the
    /// log; callers append their own "Starting <action>" line separately.
    pub fn start(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.status == TaskStatus::Pending);
        self.status = TaskStatus::Running;
        self.start = Some(now);
    }

    /// Mark the task complete. No-op tasks that never ran (e.g. `disable-asg`
    /// with no predecessor) still go through `start` immediately before this
    /// so `start <= end` always holds.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.status.can_advance_to(TaskStatus::Completed));
        self.status = TaskStatus::Completed;
        self.end = Some(now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        debug_assert!(self.status.can_advance_to(TaskStatus::Failed));
        self.status = TaskStatus::Failed;
        self.end = Some(now);
        self.log.push(LogEntry { date: now, message: message.into() });
    }

    pub fn terminate(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        debug_assert!(self.status.can_advance_to(TaskStatus::Terminated));
        self.status = TaskStatus::Terminated;
        self.end = Some(now);
        self.log.push(LogEntry { date: now, message: message.into() });
    }

    pub fn append_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }
}

/// Build the six pending tasks in their fixed order.
pub fn initial_task_sequence() -> Vec<Task> {
    Action::SEQUENCE.iter().copied().map(Task::pending).collect()
}
