use std::collections::BTreeMap;

/// Values that flow through recorded calls. Arguments and return values are
/// `serde_json::Value` so the recorder can render them without knowing
/// anything about the functions it instruments.
pub type Value = serde_json::Value;

/// Renders one value into label text. Swappable so callers can change how
/// arguments and results appear in the graph; the display text is not a
/// stable serialization format.
pub type Stringify = fn(&Value) -> String;

pub fn default_stringify(value: &Value) -> String {
    value.to_string()
}

// The arguments of one call: positional values first, then keyword pairs.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        CallArgs {
            positional: values,
            keyword: Vec::new(),
        }
    }

    pub fn push(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    pub fn push_keyword(mut self, name: &str, value: Value) -> Self {
        self.keyword.push((name.to_string(), value));
        self
    }

    pub fn pos(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Argument list as it appears inside the label parentheses:
    /// positional values joined by ", ", then "name=value" pairs in the
    /// order they were supplied.
    pub fn render(&self, stringify: Stringify) -> String {
        let mut parts: Vec<String> = self.positional.iter().map(stringify).collect();
        parts.extend(
            self.keyword
                .iter()
                .map(|(name, value)| format!("{}={}", name, stringify(value))),
        );
        parts.join(", ")
    }

    /// Canonical text for equality-based identity and memoization keys.
    /// Deterministic for a given argument sequence; keyword order matters.
    pub fn key(&self) -> String {
        let positional: Vec<String> = self.positional.iter().map(|v| v.to_string()).collect();
        let keyword: Vec<String> = self
            .keyword
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        format!("({})[{}]", positional.join(", "), keyword.join(", "))
    }
}

// Recorder configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Use equality-based call identity for every wrapped function, not just
    /// ones that expose a cache reset.
    pub equal: bool,
    /// Move return values from node labels onto reversed caller->callee edges.
    pub label_returns: bool,
    /// Graph-level display attributes (e.g. rankdir, size), passed through
    /// to the rendering unvalidated.
    pub graph_attrs: BTreeMap<String, String>,
    pub stringify: Stringify,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        RecorderOptions {
            equal: false,
            label_returns: false,
            graph_attrs: BTreeMap::new(),
            stringify: default_stringify,
        }
    }
}
