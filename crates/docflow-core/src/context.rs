use std::sync::Arc;

use serde_json::{Map, Value};

/// Working context of one workflow run.
///
/// The caller-supplied input is frozen behind an `Arc` and shared by every
/// node of the run. Values produced while the run progresses go into a
/// separate accumulator. Keys are never removed, so a node always sees
/// everything written by the nodes executed before it.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    input: Arc<Map<String, Value>>,
    written: Map<String, Value>,
}

impl RunContext {
    pub fn new(input: Map<String, Value>) -> Self {
        Self {
            input: Arc::new(input),
            written: Map::new(),
        }
    }

    /// Build the working context for a run: the caller's context plus the
    /// run identifiers. `null` ids are still recorded so snapshots show them.
    pub fn for_run(
        mut initial: Map<String, Value>,
        document_id: Option<&str>,
        user_id: Option<&str>,
        trigger: &str,
    ) -> Self {
        initial.insert("documentId".into(), opt_str(document_id));
        initial.insert("userId".into(), opt_str(user_id));
        initial.insert("trigger".into(), Value::String(trigger.to_string()));
        Self::new(initial)
    }

    /// Get a value by key. Accumulated values shadow the input.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.written
            .get(key)
            .or_else(|| self.input.get(key))
            .filter(|v| !v.is_null())
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    /// Get a value rendered as text: strings as-is, numbers and booleans
    /// through their JSON form.
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.get_str("documentId")
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get_str("userId")
    }

    /// Record a value produced during the run.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.written.insert(key.into(), value);
    }

    /// Merge a batch of produced values.
    pub fn extend(&mut self, values: Map<String, Value>) {
        for (k, v) in values {
            self.set(k, v);
        }
    }

    /// Flattened view of input plus accumulated values.
    pub fn snapshot(&self) -> Value {
        let mut merged = (*self.input).clone();
        for (k, v) in &self.written {
            merged.insert(k.clone(), v.clone());
        }
        Value::Object(merged)
    }
}

fn opt_str(value: Option<&str>) -> Value {
    value
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}
