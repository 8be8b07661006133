use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

/// The fields of a record.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A single event flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Tag of the input that produced the record, used by outputs to select records.
    pub tag: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: SystemTime,
    pub fields: Fields,
}

impl Record {
    /// Creates a new record timestamped now.
    pub fn new(tag: impl Into<String>, fields: Fields) -> Self {
        Self {
            tag: tag.into(),
            timestamp: SystemTime::now(),
            fields,
        }
    }

    /// Number of seconds since the Unix epoch, with a sub-second part.
    pub fn unix_time(&self) -> f64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

fn serialize_timestamp<S: Serializer>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let secs = t.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default();
    serializer.serialize_f64(secs)
}

/// Accumulates the records produced by one call to [`Input::collect`](super::Input::collect).
///
/// Every record pushed to the buffer receives the tag of the input instance.
#[derive(Debug)]
pub struct RecordBuffer {
    tag: String,
    records: Vec<Record>,
}

impl RecordBuffer {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            records: Vec::new(),
        }
    }

    /// The tag that is applied to the records.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Pushes a new record with the given fields.
    pub fn push(&mut self, fields: Fields) {
        self.records.push(Record::new(self.tag.clone(), fields));
    }

    /// Pushes a new record with a single field.
    pub fn push_field(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        let mut fields = Fields::new();
        fields.insert(key.into(), value.into());
        self.push(fields);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
