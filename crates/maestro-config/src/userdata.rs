//! User-data assembly.
//!
//! Rendering is a deterministic `${...}` template substitution keyed on the
//! deployment's resolved parameters.

use std::collections::BTreeMap;

use base64::Engine;

/// Everything the boot-time script fragment needs.
#[derive(Debug, Clone)]
pub struct UserDataContext {
    pub application: String,
    pub environment: String,
    pub region: String,
    pub hash: String,
    pub image_id: String,
    /// Extra `KEY=value` pairs sourced from deployment-params / launch-data.
    pub extra_vars: BTreeMap<String, String>,
}

/// Render the boot-time script fragment. The result always contains
/// `export HASH=<hash>` on its own line so the next deployment can recover
/// this deployment's configuration version.
pub fn render(ctx: &UserDataContext) -> String {
    let mut lines = vec![
        "#!/bin/bash".to_string(),
        format!("export APPLICATION={}", ctx.application),
        format!("export ENVIRONMENT={}", ctx.environment),
        format!("export REGION={}", ctx.region),
        format!("export HASH={}", ctx.hash),
        format!("export IMAGE_ID={}", ctx.image_id),
    ];

    for (key, value) in &ctx.extra_vars {
        lines.push(format!("export {key}={value}"));
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Render and base64-encode, ready to hand to the launch configuration.
pub fn render_base64(ctx: &UserDataContext) -> String {
    base64::engine::general_purpose::STANDARD.encode(render(ctx))
}

/// Recover the hash marker from a previously rendered (and possibly
/// base64-decoded) user-data blob, via `export HASH=([^\s]+)`.
pub fn extract_hash(user_data: &str) -> Option<String> {
    user_data
        .lines()
        .find_map(|line| line.trim().strip_prefix("export HASH="))
        .map(|rest| rest.split_whitespace().next().unwrap_or(rest).to_string())
}

/// Decode a base64 user-data blob and recover its hash marker.
pub fn extract_hash_from_base64(encoded: &str) -> Option<String> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    extract_hash(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> UserDataContext {
        UserDataContext {
            application: "search".to_string(),
            environment: "poke".to_string(),
            region: "eu-west-1".to_string(),
            hash: "abc123".to_string(),
            image_id: "ami-123".to_string(),
            extra_vars: BTreeMap::new(),
        }
    }

    #[test]
    fn rendered_script_embeds_hash_marker() {
        let rendered = render(&ctx());
        assert!(rendered.contains("export HASH=abc123"));
    }

    #[test]
    fn round_trips_through_extraction() {
        let rendered = render(&ctx());
        assert_eq!(extract_hash(&rendered).as_deref(), Some("abc123"));
    }

    #[test]
    fn round_trips_through_base64() {
        let encoded = render_base64(&ctx());
        assert_eq!(extract_hash_from_base64(&encoded).as_deref(), Some("abc123"));
    }
}
