use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::Validation { .. } => "validation_failed",
            StoreError::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            StoreError::NotFound { key, .. } => Some(json!({ "key": key })),
            StoreError::Validation { fields, .. } if !fields.is_empty() => {
                Some(json!({ "fields": fields }))
            }
            _ => None,
        }
    }
}

/// Collects field-level problems so a form can show all of them at once.
#[derive(Debug, Default)]
pub struct FieldErrors {
    fields: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn require(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        }
    }

    pub fn into_result(self, message: &str) -> StoreResult<()> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation {
                message: message.to_string(),
                fields: self.fields,
            })
        }
    }
}
