//! The remote store seam.
//!
//! Everything the pipeline needs from its backend is three row operations
//! plus an email lookup, behind object-safe async traits. The real
//! implementation speaks PostgREST ([`PostgrestStore`]); tests and offline
//! use get [`MemoryStore`]. Wire types live here beside the traits:
//! [`ErrorRow`] is the flat `error_logs` row an [`ErrorRecord`] maps to.

use crate::types::{
    ErrorCategory, ErrorCode, ErrorContext, ErrorDetails, ErrorFilters, ErrorRecord,
    ErrorSeverity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// Table captured errors are written to.
pub const ERROR_LOGS_TABLE: &str = "error_logs";

/// Table email existence checks run against.
pub const USER_PROFILES_TABLE: &str = "user_profiles";

/// Page size applied when a query gives an offset but no limit.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Errors from the remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure: connect, timeout, TLS.
    #[error("network error: {0}")]
    Network(String),

    /// The store answered with a non-success status.
    #[error("store rejected request (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The store answered but the body did not parse.
    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// No row matched the given identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store client was built with unusable settings.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

/// Friendly message for well-known Postgres / PostgREST error codes.
pub fn pg_error_hint(code: &str) -> Option<&'static str> {
    match code {
        "PGRST116" => Some("No rows found"),
        "23505" => Some("Duplicate entry"),
        "23503" => Some("Foreign key constraint violation"),
        "23502" => Some("Required field missing"),
        "42501" => Some("Insufficient permissions"),
        _ => None,
    }
}

/// One flat `error_logs` row as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub severity: ErrorSeverity,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// When the error occurred, as stamped by the context builder.
    pub timestamp: DateTime<Utc>,
    /// Store-assigned insert time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ErrorRecord> for ErrorRow {
    fn from(record: ErrorRecord) -> Self {
        // Context metadata and details metadata share one column; details
        // wins on key collisions.
        let mut metadata = record.context.metadata.unwrap_or_default();
        if let Some(details_metadata) = record.details.metadata {
            for (key, value) in details_metadata {
                metadata.insert(key, value);
            }
        }
        ErrorRow {
            id: record.id,
            severity: record.severity,
            category: record.category,
            message: record.details.message,
            stack: record.details.stack,
            code: record.details.code,
            name: record.details.name,
            cause: record.details.cause,
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(metadata)
            },
            resolved: record.resolved,
            url: record.context.url,
            method: record.context.method,
            user_id: record.context.user_id,
            session_id: record.context.session_id,
            request_id: record.context.request_id,
            user_agent: record.context.user_agent,
            ip_address: record.context.ip_address,
            environment: record.context.environment,
            version: record.context.version,
            timestamp: record.context.timestamp,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<ErrorRow> for ErrorRecord {
    fn from(row: ErrorRow) -> Self {
        // The merged metadata column reads back under details.
        ErrorRecord {
            id: row.id,
            severity: row.severity,
            category: row.category,
            context: ErrorContext {
                user_id: row.user_id,
                session_id: row.session_id,
                request_id: row.request_id,
                url: row.url,
                method: row.method,
                user_agent: row.user_agent,
                ip_address: row.ip_address,
                timestamp: row.timestamp,
                environment: row.environment,
                version: row.version,
                metadata: None,
            },
            details: ErrorDetails {
                message: row.message,
                stack: row.stack,
                code: row.code,
                name: row.name,
                cause: row.cause,
                metadata: row.metadata,
            },
            resolved: row.resolved,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Store-level query, mirroring [`ErrorFilters`]. All present filters apply
/// together; results come back newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub severity: Vec<ErrorSeverity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<ErrorCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl From<ErrorFilters> for RowQuery {
    fn from(filters: ErrorFilters) -> Self {
        let limit = match (filters.limit, filters.offset) {
            // An offset without a limit pages by the default size.
            (None, Some(_)) => Some(DEFAULT_PAGE_SIZE),
            (limit, _) => limit,
        };
        RowQuery {
            severity: filters.severity,
            category: filters.category,
            resolved: filters.resolved,
            user_id: filters.user_id,
            date_from: filters.date_from,
            date_to: filters.date_to,
            limit,
            offset: filters.offset,
        }
    }
}

/// Fields an update may touch. Only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RowPatch {
    /// The patch that marks a row resolved now.
    pub fn resolve() -> Self {
        RowPatch {
            resolved: Some(true),
            updated_at: Some(Utc::now()),
        }
    }
}

/// Row operations the pipeline needs from its backend.
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Insert a batch of rows. All-or-nothing: an error means none of the
    /// batch can be assumed written.
    async fn insert_rows(&self, table: &str, rows: Vec<ErrorRow>) -> Result<(), StoreError>;

    /// Read rows matching the query, newest first.
    async fn query_rows(&self, table: &str, query: RowQuery) -> Result<Vec<ErrorRow>, StoreError>;

    /// Patch the row with the given id. Returns how many rows matched.
    async fn update_row(&self, table: &str, id: &str, patch: RowPatch)
        -> Result<u64, StoreError>;
}

/// Email lookup against the user profile table.
#[async_trait]
pub trait EmailDirectory: Send + Sync {
    /// Whether any profile row carries exactly this email.
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;
}
