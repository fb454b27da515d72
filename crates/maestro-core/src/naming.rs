//! Deterministic successor naming for ASGs and launch configurations.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// The parsed pieces of an ASG name of the form `<application>-<environment>`,
/// `<application>-<environment>-vNNN`, or
/// `<application>-<environment>-vNNN-<timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsgNameDetails {
    pub application: String,
    pub environment: String,
    pub version: Option<u32>,
}

// `<app>-<env>` may themselves contain dashes, so the version/timestamp
// suffix is matched from the right and everything before it is split on the
// last remaining dash to get environment, then application.
static VERSIONED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-v(\d{3})(?:-\d{14})?$").unwrap());

/// Parse a predecessor ASG name into its components. Returns `None` when the
/// name matches none of the three grammars — the caller treats that as "no
/// predecessor".
pub fn parse_asg_name(name: &str) -> Option<AsgNameDetails> {
    if let Some(caps) = VERSIONED.captures(name) {
        let base = &caps[1];
        let version: u32 = caps[2].parse().ok()?;
        let (application, environment) = split_app_env(base)?;
        return Some(AsgNameDetails { application, environment, version: Some(version) });
    }

    let (application, environment) = split_app_env(name)?;
    Some(AsgNameDetails { application, environment, version: None })
}

fn split_app_env(base: &str) -> Option<(String, String)> {
    let idx = base.rfind('-')?;
    let (application, rest) = base.split_at(idx);
    let environment = &rest[1..];
    if application.is_empty() || environment.is_empty() {
        return None;
    }
    Some((application.to_string(), environment.to_string()))
}

/// The next successor version: wraps from "no version" to `v001`, otherwise
/// increments by one, zero-padded to three digits.
pub fn next_version(current: Option<u32>) -> u32 {
    current.map(|v| v + 1).unwrap_or(1)
}

/// Render `<application>-<environment>-vNNN`.
pub fn successor_asg_name(application: &str, environment: &str, version: u32) -> String {
    format!("{application}-{environment}-v{version:03}")
}

/// Given a predecessor ASG name (or `None` for a first deployment), compute
/// the successor ASG name.
pub fn next_asg_name(application: &str, environment: &str, previous_asg_name: Option<&str>) -> String {
    let previous_version = previous_asg_name.and_then(parse_asg_name).and_then(|d| d.version);
    successor_asg_name(application, environment, next_version(previous_version))
}

/// `<asg-name>-<yyyyMMddHHmmss>` in UTC.
pub fn launch_configuration_name(asg_name: &str, now: DateTime<Utc>) -> String {
    format!("{asg_name}-{}", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_deployment_has_no_predecessor() {
        assert_eq!(next_asg_name("search", "poke", None), "search-poke-v001");
    }

    #[test]
    fn successor_increments_version() {
        assert_eq!(
            next_asg_name("search", "poke", Some("search-poke-v023")),
            "search-poke-v024"
        );
    }

    #[test]
    fn bare_name_without_version_is_treated_as_v000_predecessor() {
        // `app-env` with no version suffix parses, but has no version number,
        // so the successor wraps up to v001 just like "no predecessor".
        assert_eq!(next_asg_name("search", "poke", Some("search-poke")), "search-poke-v001");
    }

    #[test]
    fn rejects_names_outside_the_three_grammars() {
        assert_eq!(parse_asg_name(""), None);
        assert_eq!(parse_asg_name("-"), None);
        assert_eq!(parse_asg_name("search"), None);
    }

    #[test]
    fn parses_name_with_trailing_launch_config_timestamp() {
        let details = parse_asg_name("search-poke-v023-20250101120000").unwrap();
        assert_eq!(details.application, "search");
        assert_eq!(details.environment, "poke");
        assert_eq!(details.version, Some(23));
    }

    #[test]
    fn launch_configuration_name_is_asg_name_plus_utc_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(launch_configuration_name("search-poke-v001", now), "search-poke-v001-20250304050607");
    }
}
