//! Native event passthrough

use crate::error::Result;
use crate::types::Event;

/// Accepts events that are already in canonical shape
pub struct NativeAdapter;

impl NativeAdapter {
    /// Default then validate a directly-submitted event
    pub fn convert(mut event: Event) -> Result<Event> {
        event.apply_defaults();
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;

    #[test]
    fn test_convert_applies_defaults() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "name": "build.finished",
            "source": "ci",
            "hubName": "hub-1",
            "payload": {"ok": true}
        }))
        .unwrap();

        let event = NativeAdapter::convert(event).unwrap();
        assert!(event.id.starts_with("evt-"));
        assert!(!event.correlation_id.is_empty());
    }

    #[test]
    fn test_convert_keeps_caller_ids() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "correlationId": "retry-7",
            "name": "build.finished",
            "hubName": "hub-1",
            "payload": {"ok": true}
        }))
        .unwrap();

        let event = NativeAdapter::convert(event).unwrap();
        assert_eq!(event.id, "abc");
        assert_eq!(event.correlation_id, "retry-7");
    }

    #[test]
    fn test_convert_rejects_missing_hub() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "name": "build.finished",
            "payload": {"ok": true}
        }))
        .unwrap();

        let err = NativeAdapter::convert(event).unwrap_err();
        assert!(matches!(err, IngestError::Validation { field: "hubName" }));
    }
}
