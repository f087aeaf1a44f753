//! In-memory store for tests and offline use.
//!
//! Behaves like the real backend where the pipeline can tell: assigns ids
//! and insert times, filters and orders queries, patches by id. Failure
//! injection and per-method call counters let tests drive the retry paths
//! deterministically.

use super::{EmailDirectory, ErrorRow, ErrorStore, RowPatch, RowQuery, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    rows: Vec<ErrorRow>,
    emails: Vec<String>,
    fail_next_inserts: u32,
    fail_all_inserts: bool,
    fail_next_email_checks: u32,
    insert_calls: usize,
    query_calls: usize,
    update_calls: usize,
    email_calls: usize,
}

/// Store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a preloaded set of known emails.
    pub fn with_emails(emails: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.emails = emails.iter().map(|e| e.to_string()).collect();
        }
        store
    }

    pub fn add_email(&self, email: &str) {
        self.inner.lock().unwrap().emails.push(email.to_string());
    }

    /// Fail the next `n` insert calls with a network error.
    pub fn fail_next_inserts(&self, n: u32) {
        self.inner.lock().unwrap().fail_next_inserts = n;
    }

    /// Fail every insert call until turned off.
    pub fn fail_all_inserts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_all_inserts = fail;
    }

    /// Fail the next `n` email lookups with a network error.
    pub fn fail_next_email_checks(&self, n: u32) {
        self.inner.lock().unwrap().fail_next_email_checks = n;
    }

    /// Snapshot of stored rows in insertion order.
    pub fn rows(&self) -> Vec<ErrorRow> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }

    pub fn insert_calls(&self) -> usize {
        self.inner.lock().unwrap().insert_calls
    }

    pub fn query_calls(&self) -> usize {
        self.inner.lock().unwrap().query_calls
    }

    pub fn update_calls(&self) -> usize {
        self.inner.lock().unwrap().update_calls
    }

    pub fn email_calls(&self) -> usize {
        self.inner.lock().unwrap().email_calls
    }
}

fn matches(row: &ErrorRow, query: &RowQuery) -> bool {
    if !query.severity.is_empty() && !query.severity.contains(&row.severity) {
        return false;
    }
    if !query.category.is_empty() && !query.category.contains(&row.category) {
        return false;
    }
    if let Some(resolved) = query.resolved {
        if row.resolved != resolved {
            return false;
        }
    }
    if let Some(user_id) = &query.user_id {
        if row.user_id.as_deref() != Some(user_id.as_str()) {
            return false;
        }
    }
    if let Some(from) = query.date_from {
        match row.created_at {
            Some(created) if created >= from => {}
            _ => return false,
        }
    }
    if let Some(to) = query.date_to {
        match row.created_at {
            Some(created) if created <= to => {}
            _ => return false,
        }
    }
    true
}

#[async_trait]
impl ErrorStore for MemoryStore {
    async fn insert_rows(&self, _table: &str, rows: Vec<ErrorRow>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.insert_calls += 1;
        if inner.fail_all_inserts {
            return Err(StoreError::Network("injected insert failure".to_string()));
        }
        if inner.fail_next_inserts > 0 {
            inner.fail_next_inserts -= 1;
            return Err(StoreError::Network("injected insert failure".to_string()));
        }
        let now = Utc::now();
        for mut row in rows {
            if row.id.is_none() {
                row.id = Some(Uuid::new_v4().to_string());
            }
            if row.created_at.is_none() {
                row.created_at = Some(now);
            }
            inner.rows.push(row);
        }
        Ok(())
    }

    async fn query_rows(&self, _table: &str, query: RowQuery) -> Result<Vec<ErrorRow>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.query_calls += 1;
        let mut matched: Vec<ErrorRow> = inner
            .rows
            .iter()
            .filter(|row| matches(row, &query))
            .cloned()
            .collect();
        // Newest first; rows without an insert time sort last.
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = query.offset.unwrap_or(0);
        let matched: Vec<ErrorRow> = match query.limit {
            Some(limit) => matched.into_iter().skip(offset).take(limit).collect(),
            None => matched.into_iter().skip(offset).collect(),
        };
        Ok(matched)
    }

    async fn update_row(
        &self,
        _table: &str,
        id: &str,
        patch: RowPatch,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.update_calls += 1;
        let mut affected = 0;
        for row in inner.rows.iter_mut() {
            if row.id.as_deref() == Some(id) {
                if let Some(resolved) = patch.resolved {
                    row.resolved = resolved;
                }
                if let Some(updated_at) = patch.updated_at {
                    row.updated_at = Some(updated_at);
                }
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl EmailDirectory for MemoryStore {
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.email_calls += 1;
        if inner.fail_next_email_checks > 0 {
            inner.fail_next_email_checks -= 1;
            return Err(StoreError::Network("injected lookup failure".to_string()));
        }
        Ok(inner.emails.iter().any(|e| e == email))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ERROR_LOGS_TABLE;
    use super::*;
    use crate::types::{ErrorCategory, ErrorSeverity};
    use chrono::{Duration, Utc};

    fn row(message: &str, severity: ErrorSeverity) -> ErrorRow {
        ErrorRow {
            id: None,
            severity,
            category: ErrorCategory::ServerError,
            message: message.to_string(),
            stack: None,
            code: None,
            name: None,
            cause: None,
            metadata: None,
            resolved: false,
            url: None,
            method: None,
            user_id: None,
            session_id: None,
            request_id: None,
            user_agent: None,
            ip_address: None,
            environment: "test".to_string(),
            version: None,
            timestamp: Utc::now(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_created_at() {
        let store = MemoryStore::new();
        store
            .insert_rows(ERROR_LOGS_TABLE, vec![row("a", ErrorSeverity::Low)])
            .await
            .unwrap();
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].id.is_some());
        assert!(rows[0].created_at.is_some());
        assert_eq!(store.insert_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.fail_next_inserts(1);
        let err = store
            .insert_rows(ERROR_LOGS_TABLE, vec![row("a", ErrorSeverity::Low)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
        assert_eq!(store.row_count(), 0);

        store
            .insert_rows(ERROR_LOGS_TABLE, vec![row("a", ErrorSeverity::Low)])
            .await
            .unwrap();
        assert_eq!(store.row_count(), 1);
        assert_eq!(store.insert_calls(), 2);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut old = row("old", ErrorSeverity::Low);
        old.id = Some("old".to_string());
        old.created_at = Some(now - Duration::hours(2));
        let mut recent = row("recent", ErrorSeverity::High);
        recent.id = Some("recent".to_string());
        recent.created_at = Some(now);
        recent.resolved = true;
        store
            .insert_rows(ERROR_LOGS_TABLE, vec![old, recent])
            .await
            .unwrap();

        let all = store
            .query_rows(ERROR_LOGS_TABLE, RowQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        // Newest first.
        assert_eq!(all[0].message, "recent");

        let high_only = store
            .query_rows(
                ERROR_LOGS_TABLE,
                RowQuery {
                    severity: vec![ErrorSeverity::High],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(high_only.len(), 1);
        assert_eq!(high_only[0].message, "recent");

        let unresolved = store
            .query_rows(
                ERROR_LOGS_TABLE,
                RowQuery {
                    resolved: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].message, "old");

        let windowed = store
            .query_rows(
                ERROR_LOGS_TABLE,
                RowQuery {
                    date_from: Some(now - Duration::hours(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].message, "recent");
    }

    #[tokio::test]
    async fn test_query_pagination() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for i in 0..5 {
            let mut r = row(&format!("m{}", i), ErrorSeverity::Low);
            r.created_at = Some(now - Duration::minutes(i));
            store.insert_rows(ERROR_LOGS_TABLE, vec![r]).await.unwrap();
        }
        let page = store
            .query_rows(
                ERROR_LOGS_TABLE,
                RowQuery {
                    limit: Some(2),
                    offset: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        // Newest first is m0, so offset 1 starts at m1.
        assert_eq!(page[0].message, "m1");
        assert_eq!(page[1].message, "m2");
    }

    #[tokio::test]
    async fn test_update_row_patches_matching_id() {
        let store = MemoryStore::new();
        store
            .insert_rows(ERROR_LOGS_TABLE, vec![row("a", ErrorSeverity::Low)])
            .await
            .unwrap();
        let id = store.rows()[0].id.clone().unwrap();

        let affected = store
            .update_row(ERROR_LOGS_TABLE, &id, RowPatch::resolve())
            .await
            .unwrap();
        assert_eq!(affected, 1);
        let updated = &store.rows()[0];
        assert!(updated.resolved);
        assert!(updated.updated_at.is_some());

        let affected = store
            .update_row(ERROR_LOGS_TABLE, "missing", RowPatch::resolve())
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_email_lookup() {
        let store = MemoryStore::with_emails(&["known@example.com"]);
        assert!(store.email_exists("known@example.com").await.unwrap());
        assert!(!store.email_exists("other@example.com").await.unwrap());
        assert_eq!(store.email_calls(), 2);

        store.fail_next_email_checks(1);
        assert!(store.email_exists("known@example.com").await.is_err());
        assert!(store.email_exists("known@example.com").await.unwrap());
    }
}
