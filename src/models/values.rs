use crate::constants::VALUES_KEY_GLOBAL;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Layered Helm values payload.
///
/// `Values` is value-like: `clone()` produces a deep copy, so derived graphs,
/// tasks and release manifests never alias the values of the spec they were
/// built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(Map<String, Value>);

impl Values {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Build the values a subchart release sees: the subchart's own named
    /// block flattened to the top level, plus the `global` block. Sibling
    /// subchart blocks never leak in. Mirrors what the Helm client does with
    /// the global values file and subchart values.
    pub fn subchart_values(&self, subchart_name: &str) -> Values {
        let mut data = Map::new();
        if let Some(Value::Object(own)) = self.0.get(subchart_name) {
            for (key, value) in own {
                data.insert(key.clone(), value.clone());
            }
        }
        if let Some(Value::Object(global)) = self.0.get(VALUES_KEY_GLOBAL) {
            data.insert(
                VALUES_KEY_GLOBAL.to_string(),
                Value::Object(global.clone()),
            );
        }
        Values(data)
    }

    /// Disable a subchart in the parent chart's own values by setting
    /// `{subchart: {enabled: false}}`. The subchart is deployed as its own
    /// task, so the parent must not deploy it again.
    pub fn disable_subchart(&mut self, subchart_name: &str) {
        self.0.insert(
            subchart_name.to_string(),
            serde_json::json!({ "enabled": false }),
        );
    }

    /// True if the subchart has been disabled in these values.
    pub fn subchart_disabled(&self, subchart_name: &str) -> bool {
        self.0
            .get(subchart_name)
            .and_then(|v| v.get("enabled"))
            .and_then(Value::as_bool)
            .map(|enabled| !enabled)
            .unwrap_or(false)
    }
}

impl From<Map<String, Value>> for Values {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for Values {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }
}
