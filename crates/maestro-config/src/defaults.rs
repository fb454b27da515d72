//! Deployment-parameter defaults.

use serde_json::{json, Map, Value};

/// Default values overlaid onto whatever deployment-params the configuration
/// service returned. After `apply`, every key here is guaranteed present.
pub struct DeploymentParamDefaults;

impl DeploymentParamDefaults {
    /// The defaults table.
    pub fn table() -> Vec<(&'static str, Value)> {
        vec![
            ("default-cooldown", json!(10)),
            ("desired-capacity", json!(1)),
            ("health-check-grace-period", json!(600)),
            ("health-check-type", json!("EC2")),
            ("instance-healthy-attempts", json!(50)),
            ("instance-type", json!("t1.micro")),
            ("load-balancer-healthy-attempts", json!(50)),
            ("max", json!(1)),
            ("min", json!(1)),
            ("pause-after-instances-healthy", json!(false)),
            ("pause-after-load-balancers-healthy", json!(false)),
            ("selected-zones", json!(["a", "b"])),
            ("subnet-purpose", json!("internal")),
            ("termination-policy", json!("Default")),
        ]
    }

    /// Overlay the defaults onto `params` (values already present in
    /// `params` win), then coerce `selected-load-balancers` to a sequence:
    /// a bare string becomes a one-element list, `null`/absent is dropped.
    pub fn apply(mut params: Map<String, Value>) -> Map<String, Value> {
        for (key, default) in Self::table() {
            params.entry(key).or_insert(default);
        }

        match params.remove("selected-load-balancers") {
            Some(Value::String(s)) => {
                params.insert("selected-load-balancers".to_string(), json!([s]));
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                params.insert("selected-load-balancers".to_string(), other);
            }
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlays_every_default_key() {
        let applied = DeploymentParamDefaults::apply(Map::new());
        for (key, _) in DeploymentParamDefaults::table() {
            assert!(applied.contains_key(key), "missing default for {key}");
        }
    }

    #[test]
    fn does_not_override_explicit_values() {
        let mut params = Map::new();
        params.insert("min".to_string(), json!(5));
        let applied = DeploymentParamDefaults::apply(params);
        assert_eq!(applied["min"], json!(5));
    }

    #[test]
    fn coerces_single_load_balancer_string_to_list() {
        let mut params = Map::new();
        params.insert("selected-load-balancers".to_string(), json!("my-elb"));
        let applied = DeploymentParamDefaults::apply(params);
        assert_eq!(applied["selected-load-balancers"], json!(["my-elb"]));
    }

    #[test]
    fn drops_nil_load_balancers() {
        let mut params = Map::new();
        params.insert("selected-load-balancers".to_string(), Value::Null);
        let applied = DeploymentParamDefaults::apply(params);
        assert!(!applied.contains_key("selected-load-balancers"));
    }
}
