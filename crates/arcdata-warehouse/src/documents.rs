//! JSON side store for payloads that have no tabular shape (filings, lookup tables).
//!
//! A document is addressed by a collection name and a set of key fields taken
//! from the record itself. The key fields are stored in canonical form (sorted
//! field names, compact JSON) so the same fields always address the same row.

use std::collections::BTreeMap;

use ::duckdb::ToSql;
use serde_json::Value;

use crate::{Warehouse, WarehouseError};

/// Key fields that address one document within a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentKey {
    fields: BTreeMap<String, Value>,
}

impl DocumentKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Extract `key_fields` from a JSON object.
    pub fn from_record(record: &Value, key_fields: &[&str]) -> Result<Self, WarehouseError> {
        let Some(object) = record.as_object() else {
            return Err(WarehouseError::InvalidData(String::from(
                "document must be a JSON object",
            )));
        };
        if key_fields.is_empty() {
            return Err(WarehouseError::InvalidData(String::from(
                "document key needs at least one field",
            )));
        }

        let mut key = Self::new();
        for field in key_fields {
            let value = object.get(*field).ok_or_else(|| {
                WarehouseError::InvalidData(format!("document is missing key field '{field}'"))
            })?;
            key.fields.insert((*field).to_owned(), value.clone());
        }
        Ok(key)
    }

    fn canonical(&self) -> Result<String, WarehouseError> {
        if self.fields.is_empty() {
            return Err(WarehouseError::InvalidData(String::from(
                "document key needs at least one field",
            )));
        }
        Ok(serde_json::to_string(&self.fields)?)
    }
}

impl Warehouse {
    /// Fetch the document stored under `key`, if any.
    pub fn get_document(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<Value>, WarehouseError> {
        let doc_key = key.canonical()?;
        let connection = self.connection()?;
        let params: [&dyn ToSql; 2] = [&collection, &doc_key];
        let mut statement =
            connection.prepare("SELECT body FROM documents WHERE collection = ? AND doc_key = ?")?;
        let mut rows = statement.query(params.as_slice())?;
        match rows.next()? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    /// Insert `record` or replace the document that shares its `key_fields`.
    pub fn upsert_document(
        &self,
        collection: &str,
        record: &Value,
        key_fields: &[&str],
    ) -> Result<DocumentKey, WarehouseError> {
        let key = DocumentKey::from_record(record, key_fields)?;
        let doc_key = key.canonical()?;
        let body = serde_json::to_string(record)?;

        let connection = self.writer()?;
        let params: [&dyn ToSql; 3] = [&collection, &doc_key, &body];
        connection.execute(
            "INSERT OR REPLACE INTO documents (collection, doc_key, body, updated_at) \
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        tracing::debug!(collection, doc_key, "upserted document");
        Ok(key)
    }

    /// Every document in a collection, in key order.
    pub fn all_documents(&self, collection: &str) -> Result<Vec<Value>, WarehouseError> {
        let connection = self.connection()?;
        let mut statement = connection
            .prepare("SELECT body FROM documents WHERE collection = ? ORDER BY doc_key")?;
        let mut rows = statement.query([collection])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            out.push(serde_json::from_str(&body)?);
        }
        Ok(out)
    }
}
