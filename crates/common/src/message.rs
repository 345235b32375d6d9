//! Messages pushed to live observers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CyNovaRun, TimelineEvent};

/// One broadcast frame, serialized as JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    /// A framework lifecycle hook fired
    Lifecycle {
        phase: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spec: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },

    /// A timeline event was recorded
    Timeline { event: TimelineEvent },

    /// A client task delivered a log entry
    Task { task: String, entry: Value },

    /// The finished report
    Summary { run: Box<CyNovaRun> },
}

impl LiveMessage {
    pub fn lifecycle(phase: &str, spec: Option<&str>, details: Option<Value>) -> Self {
        LiveMessage::Lifecycle {
            phase: phase.to_string(),
            spec: spec.map(str::to_string),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimelineKind;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        let msg = LiveMessage::lifecycle("before:spec", Some("a.cy.ts"), None);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "lifecycle", "phase": "before:spec", "spec": "a.cy.ts"})
        );

        let msg = LiveMessage::Timeline {
            event: TimelineEvent::new(TimelineKind::RunStart, 0.0),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("timeline"));
        assert_eq!(value["event"]["type"], json!("run:start"));

        let msg = LiveMessage::Task {
            task: "cynova:console".into(),
            entry: json!({"message": "hi"}),
        };
        assert_eq!(serde_json::to_value(&msg).unwrap()["task"], json!("cynova:console"));
    }
}
