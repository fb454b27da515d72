//! ASG-name extraction from a state-changing provider call's response. Two
//! strategies, tried in that order: the redirect might point straight at
//! the new ASG's show page, or at a task show page whose log line names the
//! ASG once the provider gets around to creating it.

use std::sync::LazyLock;

use maestro_core::task::Task;
use regex::Regex;

static CREATING_ASG_LOG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Creating auto scaling group '([^']+)'").unwrap());

/// Strategy one: the redirect `Location` names the ASG show page directly,
/// so the ASG name is its last path segment.
pub fn name_from_location(location: &str) -> Option<String> {
    let name = location.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Strategy two: the redirect pointed at a task show page instead, so the
/// name has to be recovered from the tracked task's own log once the
/// provider has logged the creation line.
pub fn name_from_task_log(task: &Task) -> Option<String> {
    task.log.iter().find_map(|entry| CREATING_ASG_LOG_LINE.captures(&entry.message).map(|c| c[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maestro_core::task::LogEntry;

    #[test]
    fn extracts_trailing_path_segment() {
        assert_eq!(
            name_from_location("https://provider.example.com/asgs/search-poke-v002"),
            Some("search-poke-v002".to_string())
        );
    }

    #[test]
    fn rejects_location_with_no_segment() {
        assert_eq!(name_from_location("https://provider.example.com/"), None);
    }

    #[test]
    fn scans_task_log_for_creation_line() {
        let mut task = Task::pending(maestro_core::task::Action::CreateAsg);
        task.log.push(LogEntry { date: Utc::now(), message: "Validating parameters".to_string() });
        task.log.push(LogEntry { date: Utc::now(), message: "Creating auto scaling group 'search-poke-v002'".to_string() });
        assert_eq!(name_from_task_log(&task), Some("search-poke-v002".to_string()));
    }

    #[test]
    fn returns_none_when_no_creation_line_yet() {
        let task = Task::pending(maestro_core::task::Action::CreateAsg);
        assert_eq!(name_from_task_log(&task), None);
    }
}
