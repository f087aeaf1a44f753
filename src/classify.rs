//! Severity and category heuristics.
//!
//! Both functions are pure: same input, same answer. Rules are ordered
//! case-insensitive substring checks over the error's name and message;
//! the first match wins. Only typed errors carry enough signal to match,
//! everything else falls through to the defaults.

use crate::capture::RawError;
use crate::config::Runtime;
use crate::types::{ErrorCategory, ErrorSeverity};

/// Pick a category for a captured error. Non-typed errors take the runtime
/// fallback: `client_error` on Client, `server_error` on Server.
pub fn categorize(raw: &RawError, runtime: Runtime) -> ErrorCategory {
    if let RawError::Typed { name, message, .. } = raw {
        let name = name.to_lowercase();
        let message = message.to_lowercase();

        if name.contains("auth") || message.contains("auth") {
            return ErrorCategory::AuthenticationError;
        }
        if name.contains("validation") || message.contains("validation") {
            return ErrorCategory::ValidationError;
        }
        if name.contains("network") || message.contains("network") || message.contains("fetch") {
            return ErrorCategory::NetworkError;
        }
        if name.contains("database") || message.contains("database") || message.contains("sql") {
            return ErrorCategory::DatabaseError;
        }
    }
    match runtime {
        Runtime::Client => ErrorCategory::ClientError,
        Runtime::Server => ErrorCategory::ServerError,
    }
}

/// Pick a severity for a captured error. Non-typed errors are `Low`.
pub fn determine_severity(raw: &RawError) -> ErrorSeverity {
    if let RawError::Typed { name, message, .. } = raw {
        let name = name.to_lowercase();
        let message = message.to_lowercase();

        if name.contains("critical")
            || message.contains("critical")
            || message.contains("fatal")
            || message.contains("security")
        {
            return ErrorSeverity::Critical;
        }
        // "error" is checked on the name only; nearly every message would
        // match it otherwise.
        if name.contains("error")
            || message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("not found")
        {
            return ErrorSeverity::High;
        }
        if name.contains("warning") || message.contains("warning") || message.contains("timeout") {
            return ErrorSeverity::Medium;
        }
    }
    ErrorSeverity::Low
}
