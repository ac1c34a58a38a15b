use serde::Deserialize;
use serde_json::Value;

use docflow_core::context::RunContext;
use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::ConditionEvaluator;
use docflow_core::types::NodeConfig;

use super::glob::glob_matches;
use crate::node_config::{parse_node_config, value_f64, value_text};

/// Config shared by the single-value conditions.
#[derive(Debug, Default, Deserialize)]
struct ValueConfig {
    #[serde(default)]
    value: Option<Value>,
}

/// Wildcard match of `config.value` against one context field.
fn glob_condition(component: &str, config: &NodeConfig, ctx: &RunContext, field: &str) -> Result<bool> {
    let cfg: ValueConfig = parse_node_config(component, config)?;
    let (Some(pattern), Some(candidate)) = (cfg.value.as_ref().and_then(value_text), ctx.get_text(field))
    else {
        return Ok(false);
    };
    glob_matches(&pattern, &candidate)
        .map_err(|e| DocflowError::invalid_config(component, e.to_string()))
}

/// `customerIs`: wildcard match on `context.customer`.
pub struct CustomerIs;

impl ConditionEvaluator for CustomerIs {
    fn component(&self) -> &str {
        "customerIs"
    }

    fn evaluate(&self, config: &NodeConfig, ctx: &RunContext) -> Result<bool> {
        glob_condition(self.component(), config, ctx, "customer")
    }
}

/// `location`: wildcard match on `context.location`.
pub struct LocationIs;

impl ConditionEvaluator for LocationIs {
    fn component(&self) -> &str {
        "location"
    }

    fn evaluate(&self, config: &NodeConfig, ctx: &RunContext) -> Result<bool> {
        glob_condition(self.component(), config, ctx, "location")
    }
}

/// `documentType`: membership of `context.documentType` in a comma-separated
/// list, case-insensitive.
pub struct DocumentTypeIs;

impl ConditionEvaluator for DocumentTypeIs {
    fn component(&self) -> &str {
        "documentType"
    }

    fn evaluate(&self, config: &NodeConfig, ctx: &RunContext) -> Result<bool> {
        let cfg: ValueConfig = parse_node_config(self.component(), config)?;
        let (Some(list), Some(doc_type)) = (
            cfg.value.as_ref().and_then(value_text),
            ctx.get_text("documentType"),
        ) else {
            return Ok(false);
        };

        let doc_type = doc_type.to_lowercase();
        Ok(list
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .any(|t| t == doc_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl CompareOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            "=" => Some(Self::Eq),
            _ => None,
        }
    }

    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSizeConfig {
    #[serde(default)]
    operator: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
}

/// `fileSize`: numeric comparison `context.fileSize <op> config.value`.
pub struct FileSize;

impl ConditionEvaluator for FileSize {
    fn component(&self) -> &str {
        "fileSize"
    }

    fn evaluate(&self, config: &NodeConfig, ctx: &RunContext) -> Result<bool> {
        let cfg: FileSizeConfig = parse_node_config(self.component(), config)?;
        let op = cfg.operator.as_ref().and_then(Value::as_str).and_then(CompareOp::parse);
        let threshold = cfg.value.as_ref().and_then(value_f64);
        let size = ctx.get("fileSize").and_then(value_f64);

        Ok(match (op, size, threshold) {
            (Some(op), Some(size), Some(threshold)) => op.apply(size, threshold),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn ctx(value: Value) -> RunContext {
        match value {
            Value::Object(map) => RunContext::new(map),
            _ => RunContext::new(Map::new()),
        }
    }

    fn cfg(value: Value) -> NodeConfig {
        match value {
            Value::Object(map) => map,
            _ => NodeConfig::new(),
        }
    }

    #[test]
    fn test_customer_is_glob() {
        let config = cfg(json!({"value": "Acme*"}));
        assert!(CustomerIs
            .evaluate(&config, &ctx(json!({"customer": "Acme Corp"})))
            .unwrap());
        assert!(!CustomerIs
            .evaluate(&config, &ctx(json!({"customer": "Beta Corp"})))
            .unwrap());
        assert!(!CustomerIs.evaluate(&config, &ctx(json!({}))).unwrap());
    }

    #[test]
    fn test_customer_is_missing_pattern() {
        assert!(!CustomerIs
            .evaluate(&cfg(json!({})), &ctx(json!({"customer": "Acme"})))
            .unwrap());
    }

    #[test]
    fn test_customer_name_with_metacharacters() {
        let config = cfg(json!({"value": "A+B (Holdings)"}));
        assert!(CustomerIs
            .evaluate(&config, &ctx(json!({"customer": "a+b (holdings)"})))
            .unwrap());
        assert!(!CustomerIs
            .evaluate(&config, &ctx(json!({"customer": "AAB Holdings"})))
            .unwrap());
    }

    #[test]
    fn test_location_glob() {
        let config = cfg(json!({"value": "Warehouse-North/*"}));
        assert!(LocationIs
            .evaluate(&config, &ctx(json!({"location": "warehouse-north/R12"})))
            .unwrap());
        assert!(!LocationIs
            .evaluate(&config, &ctx(json!({"location": "Warehouse-South/R1"})))
            .unwrap());
    }

    #[test]
    fn test_document_type_list() {
        let config = cfg(json!({"value": "Contract, Invoice ,NDA"}));
        assert!(DocumentTypeIs
            .evaluate(&config, &ctx(json!({"documentType": "invoice"})))
            .unwrap());
        assert!(DocumentTypeIs
            .evaluate(&config, &ctx(json!({"documentType": "nda"})))
            .unwrap());
        assert!(!DocumentTypeIs
            .evaluate(&config, &ctx(json!({"documentType": "receipt"})))
            .unwrap());
        assert!(!DocumentTypeIs.evaluate(&config, &ctx(json!({}))).unwrap());
    }

    #[test]
    fn test_file_size_operators() {
        let size = ctx(json!({"fileSize": 10}));
        let cases = [
            (">", false),
            (">=", true),
            ("<", false),
            ("<=", true),
            ("=", true),
        ];
        for (op, expected) in cases {
            let config = cfg(json!({"operator": op, "value": 10}));
            assert_eq!(FileSize.evaluate(&config, &size).unwrap(), expected, "op {}", op);
        }

        let bigger = ctx(json!({"fileSize": "10.5"}));
        let config = cfg(json!({"operator": ">", "value": "10"}));
        assert!(FileSize.evaluate(&config, &bigger).unwrap());
    }

    #[test]
    fn test_file_size_unknown_operator_or_missing_operand() {
        let size = ctx(json!({"fileSize": 10}));
        assert!(!FileSize
            .evaluate(&cfg(json!({"operator": "!=", "value": 3})), &size)
            .unwrap());
        assert!(!FileSize
            .evaluate(&cfg(json!({"operator": ">"})), &size)
            .unwrap());
        assert!(!FileSize
            .evaluate(&cfg(json!({"operator": ">", "value": 1})), &ctx(json!({})))
            .unwrap());
        assert!(!FileSize
            .evaluate(&cfg(json!({"operator": ">", "value": "big"})), &size)
            .unwrap());
    }

    #[test]
    fn test_non_string_operator_is_unknown() {
        assert!(!FileSize
            .evaluate(&cfg(json!({"operator": 7, "value": 1})), &ctx(json!({"fileSize": 10})))
            .unwrap());
        assert!(!FileSize
            .evaluate(&cfg(json!({"operator": null, "value": 1})), &ctx(json!({"fileSize": 10})))
            .unwrap());
    }
}
