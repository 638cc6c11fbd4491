//! Record - RecordSource output
//!
//! One decoded input line and the message references attached to it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Name used for size estimation when a record has none
pub const UNKNOWN_EVENT_NAME: &str = "Unknown event name";

/// Type used for size estimation when a record has none
pub const UNKNOWN_EVENT_TYPE: &str = "Unknown event type";

/// Fixed size of an encoded timestamp
pub const TIMESTAMP_SIZE: usize = 12;

/// Fixed size of an encoded sequence number
pub const SEQUENCE_SIZE: usize = 8;

/// Decoded input record
///
/// Field names follow the input line format (`type`, `attachedMessageIds`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Record {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Type tag
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Opaque payload
    #[serde(default, with = "body", skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,

    /// Attached message references, in input order
    #[serde(default)]
    pub attached_message_ids: Vec<AttachmentRef>,
}

impl Record {
    /// Serialized-size estimate used for batch sizing
    ///
    /// Absent name/type count as the length of their placeholders so the
    /// estimate only depends on the record itself.
    pub fn estimated_size(&self) -> usize {
        self.name.as_deref().unwrap_or(UNKNOWN_EVENT_NAME).len()
            + self.event_type.as_deref().unwrap_or(UNKNOWN_EVENT_TYPE).len()
            + self.body.as_ref().map_or(0, Bytes::len)
            + self
                .attached_message_ids
                .iter()
                .map(AttachmentRef::size)
                .sum::<usize>()
    }
}

/// Reference to an externally stored message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentRef {
    /// Container identifier
    pub book: String,

    /// Logical stream alias
    pub alias: String,

    /// Grouping identifier
    pub group: String,

    /// Timestamp (nanoseconds)
    pub timestamp: i64,

    /// Sequence number
    pub sequence: i64,
}

impl AttachmentRef {
    /// Size contribution to the owning record
    pub fn size(&self) -> usize {
        self.book.len() + self.alias.len() + self.group.len() + TIMESTAMP_SIZE + SEQUENCE_SIZE
    }
}

/// Payload is carried as bytes but written and read as a JSON string
mod body {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(Bytes::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(book: &str, alias: &str, group: &str) -> AttachmentRef {
        AttachmentRef {
            book: book.to_string(),
            alias: alias.to_string(),
            group: group.to_string(),
            timestamp: 1_700_000_000_000_000_000,
            sequence: 1,
        }
    }

    #[test]
    fn test_empty_record_uses_placeholder_sizes() {
        let record = Record::default();
        assert_eq!(
            record.estimated_size(),
            UNKNOWN_EVENT_NAME.len() + UNKNOWN_EVENT_TYPE.len()
        );
    }

    #[test]
    fn test_estimated_size_sums_all_fields() {
        let record = Record {
            name: Some("abc".to_string()),
            event_type: Some("t".to_string()),
            body: Some(Bytes::from_static(b"12345")),
            attached_message_ids: vec![attachment("bk", "al", "grp")],
        };
        // 3 + 1 + 5 + (2 + 2 + 3 + 12 + 8)
        assert_eq!(record.estimated_size(), 36);
    }

    #[test]
    fn test_deserialize_input_line() {
        let line = r#"{"name":"n","type":"t","body":"{\"a\":1}","attachedMessageIds":[{"book":"b","alias":"a","group":"g","timestamp":5,"sequence":6}]}"#;
        let record: Record = serde_json::from_str(line).unwrap();
        assert_eq!(record.name.as_deref(), Some("n"));
        assert_eq!(record.event_type.as_deref(), Some("t"));
        assert_eq!(record.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(record.attached_message_ids.len(), 1);
        assert_eq!(record.attached_message_ids[0].sequence, 6);
    }

    #[test]
    fn test_deserialize_rejects_unknown_field() {
        let result = serde_json::from_str::<Record>(r#"{"name":"n","extra":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_body_serialized_as_string() {
        let record = Record {
            body: Some(Bytes::from_static(b"payload")),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"body":"payload","attachedMessageIds":[]}"#);
    }
}
