//! JSON lines decoder

use contracts::{DecodeError, Record, RecordDecoder};

/// Decodes one JSON object per line with `serde_json`
///
/// Unknown fields and blank lines are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordDecoder;

impl RecordDecoder for JsonRecordDecoder {
    fn decode(&self, line: &str) -> Result<Record, DecodeError> {
        if line.trim().is_empty() {
            return Err(DecodeError::new("blank line"));
        }
        serde_json::from_str(line)
            .map_err(|e| DecodeError::with_source(format!("invalid record: {e}"), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_record() {
        let line = r#"{"name":"n","type":"t","body":"{\"k\":1}","attachedMessageIds":[{"book":"b","alias":"a","group":"g","timestamp":1,"sequence":2}]}"#;
        let record = JsonRecordDecoder.decode(line).unwrap();
        assert_eq!(record.name.as_deref(), Some("n"));
        assert_eq!(record.event_type.as_deref(), Some("t"));
        assert_eq!(record.body.as_deref(), Some(&b"{\"k\":1}"[..]));
        assert_eq!(record.attached_message_ids.len(), 1);
        assert_eq!(record.attached_message_ids[0].sequence, 2);
    }

    #[test]
    fn test_decode_empty_object() {
        let record = JsonRecordDecoder.decode("{}").unwrap();
        assert!(record.name.is_none());
        assert!(record.attached_message_ids.is_empty());
    }

    #[test]
    fn test_reject_blank_line() {
        let err = JsonRecordDecoder.decode("   ").unwrap_err();
        assert_eq!(err.message(), "blank line");
    }

    #[test]
    fn test_reject_unknown_field_and_garbage() {
        assert!(JsonRecordDecoder.decode(r#"{"name":"n","extra":1}"#).is_err());
        assert!(JsonRecordDecoder.decode("not json").is_err());
        assert!(JsonRecordDecoder.decode(r#"{"name":5}"#).is_err());
    }
}
