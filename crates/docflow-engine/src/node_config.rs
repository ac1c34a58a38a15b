use serde::de::DeserializeOwned;
use serde_json::Value;

use docflow_core::error::{DocflowError, Result};
use docflow_core::types::NodeConfig;

/// Deserialize a node's opaque config into the handler's typed view.
pub fn parse_node_config<T: DeserializeOwned>(component: &str, config: &NodeConfig) -> Result<T> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| DocflowError::invalid_config(component, e.to_string()))
}

/// Render a scalar config or context value as text.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a number from a JSON number or a numeric string.
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a list of strings from a JSON array or a comma-separated string.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        level: u32,
    }

    #[test]
    fn test_parse_reports_component() {
        let mut config = NodeConfig::new();
        config.insert("level".into(), json!("high"));
        let err = parse_node_config::<Sample>("requireApproval", &config).unwrap_err();
        assert!(err.to_string().contains("requireApproval"));

        config.insert("level".into(), json!(3));
        let parsed: Sample = parse_node_config("requireApproval", &config).unwrap();
        assert_eq!(parsed.level, 3);
    }

    #[test]
    fn test_value_f64() {
        assert_eq!(value_f64(&json!(10)), Some(10.0));
        assert_eq!(value_f64(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(value_f64(&json!("ten")), None);
        assert_eq!(value_f64(&json!(null)), None);
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("Acme")).as_deref(), Some("Acme"));
        assert_eq!(value_text(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_text(&json!(["a"])), None);
    }

    #[test]
    fn test_string_list() {
        assert_eq!(string_list(&json!(["a", "b"])), vec!["a", "b"]);
        assert_eq!(string_list(&json!("legal, q3 ,")), vec!["legal", "q3"]);
        assert!(string_list(&json!(7)).is_empty());
    }
}
