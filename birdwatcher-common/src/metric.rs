//! Metric tuples produced from BIRD protocol status output.

use std::fmt;

/// Label carrying the protocol instance name on every metric.
pub const INSTANCE_LABEL: &str = "bird_protocol_instance";
/// Label carrying the route type of a `bird_routes` metric.
pub const ROUTE_TYPE_LABEL: &str = "bird_route_type";
/// Label carrying `import` or `export` on `bird_route_changes`.
pub const DIRECTION_LABEL: &str = "bird_direction";
/// Label carrying `updates` or `withdraws` on `bird_route_changes`.
pub const ACTION_LABEL: &str = "bird_action";
/// Label carrying the outcome column name on `bird_route_changes`.
pub const OUTCOME_LABEL: &str = "bird_outcome";

/// A single exported sample: name, ordered labels and an integer value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Metric family name, e.g. `bird_up`.
    pub name: &'static str,
    /// Labels in the order they are rendered.
    pub labels: Vec<(&'static str, String)>,
    /// Sample value.
    pub value: i64,
}

impl Metric {
    /// Create a metric labelled only with its protocol instance.
    pub fn new(name: &'static str, instance: &str, value: i64) -> Self {
        Self {
            name,
            labels: vec![(INSTANCE_LABEL, instance.to_string())],
            value,
        }
    }

    /// Append a label, keeping insertion order.
    pub fn with_label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }

    /// Look up a label value by name.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The protocol instance this metric belongs to.
    pub fn instance(&self) -> Option<&str> {
        self.label(INSTANCE_LABEL)
    }

    /// Format labels for Prometheus exposition format.
    pub fn format_labels(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();

        format!("{{{}}}", parts.join(","))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.name, self.format_labels(), self.value)
    }
}

/// Render metrics one per line, in the order given.
pub fn render_metrics(metrics: &[Metric]) -> String {
    let mut output = String::with_capacity(metrics.len() * 96);
    for metric in metrics {
        output.push_str(&metric.to_string());
        output.push('\n');
    }
    output
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}
