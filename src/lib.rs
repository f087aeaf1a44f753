//! Faultline: buffered error reporting for hosted Postgres backends.
//!
//! Captured errors are classified, stamped with request context, queued in
//! memory and flushed to a [`store::ErrorStore`] in batches. A debounced
//! email existence checker rides on the same store abstraction.

pub mod capture;
pub mod classify;
pub mod config;
pub mod context;
pub mod email_check;
pub mod logger;
pub mod sanitize;
pub mod stats;
pub mod store;
pub mod types;

mod queue;

pub use capture::{extract_details, RawError};
pub use classify::{categorize, determine_severity};
pub use config::{ReportingConfig, Runtime};
pub use context::ContextBuilder;
pub use email_check::{
    validate_email, EmailCheck, EmailCheckBuilder, EmailCheckState, CHECK_FAILED_MESSAGE,
};
pub use logger::{global, install_global, ErrorLogger, ErrorLoggerBuilder};
pub use stats::{group_by_category, summarize, summarize_at, CategoryBreakdown, ErrorStats};
pub use store::{
    EmailDirectory, ErrorRow, ErrorStore, MemoryStore, PostgrestStore, RowPatch, RowQuery,
    StoreError,
};
pub use types::{
    ErrorCategory, ErrorCode, ErrorContext, ErrorDetails, ErrorFilters, ErrorRecord,
    ErrorSeverity,
};
