//! Remote document schema.
//!
//! The remote store treats documents as an untyped bag of JSON fields.
//! Everything crossing the adapter boundary is decoded here into a
//! [`HealthRecord`]; documents that do not fit the schema are rejected
//! before they can reach the merge.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::HealthRecord;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field the remote store stamps with its own clock on every write.
pub const LAST_MODIFIED_FIELD: &str = "lastModified";

/// Format version written into new backups.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// A point-in-time copy of the whole local cache kept in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Backup ID.
    pub id: String,
    /// Every cached record at the time of the backup.
    #[serde(alias = "data")]
    pub records: Vec<HealthRecord>,
    /// Backup format version.
    pub version: String,
    /// Server-assigned creation time.
    #[serde(default, with = "crate::timestamp::optional")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Backup {
    /// Creates a backup of `records` in the current format.
    pub fn new(id: impl Into<String>, records: Vec<HealthRecord>) -> Self {
        Self {
            id: id.into(),
            records,
            version: BACKUP_FORMAT_VERSION.to_string(),
            timestamp: None,
        }
    }
}

/// A document as stored by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    /// Document ID (the record ID).
    pub id: String,
    /// Untyped document fields.
    pub fields: Map<String, Value>,
}

impl RemoteDocument {
    /// Creates a document from raw fields.
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Reads the modification timestamp, if present and well-formed.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self.fields.get(LAST_MODIFIED_FIELD)? {
            Value::String(text) => timestamp::parse_timestamp(text),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        }
    }

    /// Overwrites the modification timestamp with a server-assigned value.
    pub fn set_server_timestamp(&mut self, at: DateTime<Utc>) {
        self.fields.insert(
            LAST_MODIFIED_FIELD.to_string(),
            Value::String(timestamp::format_timestamp(&at)),
        );
    }
}

impl HealthRecord {
    /// Encodes the record as a remote document keyed by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not serialize to a JSON object.
    pub fn to_document(&self) -> ProtocolResult<RemoteDocument> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(RemoteDocument::new(self.id.clone(), fields)),
            _ => Err(ProtocolError::invalid_document(
                &self.id,
                "record did not encode to an object",
            )),
        }
    }

    /// Decodes a remote document, rejecting anything that is not record-shaped.
    ///
    /// The document ID is authoritative: an `id` field inside the bag is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidDocument`] if the ID is blank or a
    /// required field is missing or mistyped.
    pub fn from_document(document: &RemoteDocument) -> ProtocolResult<Self> {
        if document.id.trim().is_empty() {
            return Err(ProtocolError::invalid_document(&document.id, "blank document id"));
        }

        let mut fields = document.fields.clone();
        fields.insert("id".to_string(), Value::String(document.id.clone()));

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| ProtocolError::invalid_document(&document.id, e.to_string()))
    }
}

/// Decodes a batch of documents, separating valid records from rejects.
pub fn decode_documents(documents: &[RemoteDocument]) -> (Vec<HealthRecord>, Vec<ProtocolError>) {
    let mut records = Vec::with_capacity(documents.len());
    let mut rejected = Vec::new();

    for document in documents {
        match HealthRecord::from_document(document) {
            Ok(record) => records.push(record),
            Err(e) => rejected.push(e),
        }
    }

    (records, rejected)
}
