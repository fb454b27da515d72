//! External-task tracker (C2): polls a remote, long-running operation on
//! the cloud façade to completion.
//!
//! Same sleep/observe/branch/loop shape as the deployment worker's message
//! loop, but inlined into `track` rather than split across a queue and a
//! worker: here there is no queue to claim from, just a single remote task
//! handle the caller already owns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use maestro_core::collaborators::{CloudFacade, RemoteTaskStatus};
use maestro_core::store::TaskStore;
use maestro_core::task::{LogEntry, RemoteTaskRef, Task};
use maestro_core::{Error, Result};
use tracing::{error, warn};

/// Failures the tracker can hit while polling. `Http` is transient and
/// reschedules; anything else is surfaced to the caller as fatal.
/// Persistence faults from `TaskStore` are classified the same way inline
/// in `track`, without going through this enum.
#[derive(Debug)]
enum TrackerError {
    Http(String),
    Fatal(Error),
}

fn classify(err: Error) -> TrackerError {
    match err {
        Error::UpstreamHttpFault(msg) => TrackerError::Http(msg),
        other => TrackerError::Fatal(other),
    }
}

/// Outcome of tracking a remote task to either a terminal status or budget
/// exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerOutcome {
    Completed,
    Failed,
    Terminated,
    TimedOut,
}

pub struct RemoteTaskTracker {
    cloud: Arc<dyn CloudFacade>,
    tasks: Arc<dyn TaskStore>,
    poll_interval: Duration,
}

impl RemoteTaskTracker {
    pub fn new(cloud: Arc<dyn CloudFacade>, tasks: Arc<dyn TaskStore>, poll_interval: Duration) -> Self {
        Self { cloud, tasks, poll_interval }
    }

    /// Poll `task`'s remote handle until it reaches a terminal status or
    /// `budget` ticks (one per `poll_interval`) are exhausted, persisting
    /// every observation along the way.
    pub async fn track(&self, deployment_id: maestro_core::id::ResourceId, task: &mut Task, mut budget: u64) -> Result<TrackerOutcome> {
        let remote = task.remote.clone().ok_or_else(|| Error::Internal("tracked task has no remote handle".to_string()))?;

        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self.observe(&remote).await {
                Ok(observation) => {
                    append_new_log_lines(task, &observation.log);
                    if let Err(e) = self.tasks.store_task(deployment_id, task).await {
                        warn!(task = ?task.action, error = %e, "failed to persist tracker observation, rescheduling");
                    }

                    match observation.status {
                        RemoteTaskStatus::Completed => return Ok(TrackerOutcome::Completed),
                        RemoteTaskStatus::Failed => return Ok(TrackerOutcome::Failed),
                        RemoteTaskStatus::Terminated => return Ok(TrackerOutcome::Terminated),
                        RemoteTaskStatus::Running => {}
                    }
                }
                Err(TrackerError::Http(reason)) => {
                    warn!(task = ?task.action, reason, "transport fault polling remote task, rescheduling");
                }
                Err(TrackerError::Fatal(cause)) => {
                    error!(task = ?task.action, error = %cause, "fatal error polling remote task");
                    return Err(cause);
                }
            }

            if budget == 0 {
                return Ok(TrackerOutcome::TimedOut);
            }
            budget -= 1;
        }
    }

    async fn observe(&self, remote: &RemoteTaskRef) -> std::result::Result<maestro_core::collaborators::RemoteTaskObservation, TrackerError> {
        self.cloud.poll_task(remote).await.map_err(classify)
    }
}

/// Append only the log lines beyond what's already stored; the remote log
/// is cumulative, so earlier lines reappear in every observation.
fn append_new_log_lines(task: &mut Task, raw_lines: &[String]) {
    for line in raw_lines.iter().skip(task.log.len()) {
        if let Some(entry) = parse_log_line(line) {
            task.append_log(entry);
        }
    }
}

/// Parse `"YYYY-MM-DD_HH:MM:SS message text"` into `{date, message}`.
fn parse_log_line(line: &str) -> Option<LogEntry> {
    let (timestamp, message) = line.split_once(' ')?;
    let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d_%H:%M:%S").ok()?;
    Some(LogEntry { date: Utc.from_utc_datetime(&naive), message: message.to_string() })
}

/// Parse `"YYYY-MM-DD HH:MM:SS UTC"` into a UTC timestamp.
pub fn parse_update_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.strip_suffix(" UTC")?.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_line_with_underscore_separated_timestamp() {
        let entry = parse_log_line("2024-03-01_10:15:30 Creating auto scaling group 'search-poke-v001'").unwrap();
        assert_eq!(entry.message, "Creating auto scaling group 'search-poke-v001'");
        assert_eq!(entry.date.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-01 10:15:30");
    }

    #[test]
    fn parses_update_time_with_utc_suffix() {
        let parsed = parse_update_time("2024-03-01 10:15:31 UTC").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-01 10:15:31");
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_log_line("not a log line").is_none());
        assert!(parse_update_time("2024-03-01 10:15:31").is_none());
    }
}
