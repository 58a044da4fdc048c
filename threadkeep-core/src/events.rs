//! Events a session sends towards the client

use serde_json::Value;

/// Outgoing session event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Replace the input widgets shown next to the message composer
    SetInputWidgets(Vec<Value>),
}

impl SessionEvent {
    /// Event name on the client socket
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SetInputWidgets(_) => "set_input_widgets",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            SessionEvent::SetInputWidgets(widgets) => Value::Array(widgets.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_input_widgets_payload() {
        let event = SessionEvent::SetInputWidgets(vec![json!({"id": "a"})]);
        assert_eq!(event.name(), "set_input_widgets");
        assert_eq!(event.payload(), json!([{"id": "a"}]));
    }
}
