//! The error logger facade.
//!
//! [`ErrorLogger`] ties the pipeline together: capture → classify → stamp
//! context → sanitize → queue, with a background task flushing batches to
//! the store. Capture never fails and never blocks on the network; store
//! trouble surfaces as re-queues and process-log warnings. Read and resolve
//! operations talk to the store directly and do return errors.
//!
//! Loggers are built with [`ErrorLoggerBuilder`] inside a tokio runtime
//! (construction spawns the flush task) and shared as `Arc<ErrorLogger>`.

use crate::capture::{self, RawError};
use crate::classify;
use crate::config::ReportingConfig;
use crate::context::ContextBuilder;
use crate::queue::ErrorQueue;
use crate::sanitize;
use crate::store::{ErrorRow, ErrorStore, RowPatch, RowQuery, StoreError, ERROR_LOGS_TABLE};
use crate::types::{ErrorContext, ErrorFilters, ErrorRecord, ErrorSeverity};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// ============================================================
// Background flush task
// ============================================================

/// Shared handles the flush task works over. The task holds a clone, never
/// the logger itself, so dropping the logger can abort the task.
#[derive(Clone)]
struct FlushWorker {
    store: Arc<dyn ErrorStore>,
    queue: Arc<Mutex<ErrorQueue>>,
    batch_size: usize,
    interval: Duration,
    stop: Arc<Notify>,
}

impl FlushWorker {
    async fn run(self) {
        loop {
            let stopped = tokio::time::timeout(self.interval, self.stop.notified())
                .await
                .is_ok();
            if stopped {
                self.drain().await;
                debug!("Flush task stopped");
                return;
            }
            self.flush_once().await;
        }
    }

    /// Flush one batch. Returns how many rows were written; 0 covers both
    /// an empty queue and a failed insert.
    async fn flush_once(&self) -> usize {
        let batch = {
            let mut queue = self.queue.lock().unwrap();
            queue.take_batch(self.batch_size)
        };
        if batch.is_empty() {
            return 0;
        }
        let rows: Vec<ErrorRow> = batch.iter().map(|q| q.row.clone()).collect();
        match self.store.insert_rows(ERROR_LOGS_TABLE, rows).await {
            Ok(()) => batch.len(),
            Err(e) => {
                warn!("Flush of {} error records failed, re-queueing: {}", batch.len(), e);
                let dropped = {
                    let mut queue = self.queue.lock().unwrap();
                    queue.requeue(batch)
                };
                if dropped > 0 {
                    warn!("Dropped {} error records after exhausting retries", dropped);
                }
                0
            }
        }
    }

    /// Flush until the queue is empty or a batch fails.
    async fn drain(&self) {
        while self.flush_once().await > 0 {}
    }
}

// ============================================================
// Logger
// ============================================================

/// Builds an [`ErrorLogger`] over a store.
pub struct ErrorLoggerBuilder {
    store: Arc<dyn ErrorStore>,
    config: ReportingConfig,
    url: Option<String>,
    user_agent: Option<String>,
}

impl ErrorLoggerBuilder {
    pub fn new(store: Arc<dyn ErrorStore>) -> Self {
        Self {
            store,
            config: ReportingConfig::default(),
            url: None,
            user_agent: None,
        }
    }

    pub fn config(mut self, config: ReportingConfig) -> Self {
        self.config = config;
        self
    }

    /// Page url stamped onto client errors. Meaningful on Client runtime.
    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// User agent stamped onto client errors. Meaningful on Client runtime.
    pub fn page_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the logger and start its flush task. Unusable zero values in
    /// the config are clamped to 1 rather than failing; misconfigured
    /// reporting must not take the host application down.
    pub fn build(self) -> Arc<ErrorLogger> {
        let mut config = self.config;
        if config.batch_size == 0 {
            warn!("batch_size 0 is not usable, using 1");
            config.batch_size = 1;
        }
        if config.flush_interval_ms == 0 {
            warn!("flush_interval_ms 0 is not usable, using 1");
            config.flush_interval_ms = 1;
        }

        let mut context = ContextBuilder::from_config(&config);
        if let Some(url) = self.url {
            context = context.with_url(url);
        }
        if let Some(user_agent) = self.user_agent {
            context = context.with_user_agent(user_agent);
        }

        let queue = Arc::new(Mutex::new(ErrorQueue::new(
            config.max_queue,
            config.max_retries,
        )));
        let stop = Arc::new(Notify::new());
        let worker = FlushWorker {
            store: Arc::clone(&self.store),
            queue,
            batch_size: config.batch_size,
            interval: config.flush_interval(),
            stop: Arc::clone(&stop),
        };
        let task = tokio::spawn(worker.clone().run());
        info!(
            "Error logger started (batch size {}, flush every {:?})",
            config.batch_size,
            config.flush_interval()
        );
        Arc::new(ErrorLogger {
            store: self.store,
            config,
            context,
            worker,
            stop,
            task: Mutex::new(Some(task)),
        })
    }
}

/// Facade over the reporting pipeline. See the module docs.
pub struct ErrorLogger {
    store: Arc<dyn ErrorStore>,
    config: ReportingConfig,
    context: ContextBuilder,
    worker: FlushWorker,
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ErrorLogger {
    /// Capture an error. Classifies it, completes the context, mirrors it
    /// to the process log and queues it for the store. Never fails; a full
    /// queue drops its oldest record with a warning.
    pub async fn log_error(&self, error: impl Into<RawError>, context: Option<ErrorContext>) {
        let raw = error.into();
        let severity = classify::determine_severity(&raw);
        let category = classify::categorize(&raw, self.config.runtime);
        let details = capture::extract_details(&raw);
        let context = self.context.build(context);
        let mut record = ErrorRecord {
            id: None,
            severity,
            category,
            context,
            details,
            resolved: false,
            created_at: None,
            updated_at: None,
        };
        sanitize::sanitize_record(&mut record);

        if self.config.enable_console_logging {
            mirror(&record);
        }
        if !self.config.enable_database_logging {
            return;
        }

        let row = ErrorRow::from(record);
        let (dropped, queued) = {
            let mut queue = self.worker.queue.lock().unwrap();
            (queue.push(row), queue.len())
        };
        if let Some(dropped) = dropped {
            warn!("Error queue full, dropped oldest record: {}", dropped.message);
        }
        if queued >= self.config.batch_size {
            self.worker.flush_once().await;
        }
    }

    /// Capture an error through the client entrypoint. The configured page
    /// url and user agent overwrite whatever the caller's context carries.
    /// Does nothing when client logging is disabled.
    pub async fn log_client_error(
        &self,
        error: impl Into<RawError>,
        context: Option<ErrorContext>,
    ) {
        if !self.config.enable_client_logging {
            return;
        }
        let mut ctx = context.unwrap_or_default();
        self.context.stamp_client(&mut ctx);
        self.log_error(error, Some(ctx)).await;
    }

    /// Capture an error through the server entrypoint. The configured
    /// environment overwrites whatever the caller's context carries. Does
    /// nothing when server logging is disabled.
    pub async fn log_server_error(
        &self,
        error: impl Into<RawError>,
        context: Option<ErrorContext>,
    ) {
        if !self.config.enable_server_logging {
            return;
        }
        let mut ctx = context.unwrap_or_default();
        self.context.stamp_environment(&mut ctx);
        self.log_error(error, Some(ctx)).await;
    }

    /// Await a future and capture its error before handing it back
    /// unchanged.
    pub async fn observe<T, E, F>(&self, fut: F, context: Option<ErrorContext>) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let result = fut.await;
        if let Err(e) = &result {
            self.log_error(RawError::from_error(e), context).await;
        }
        result
    }

    /// Capture the error of an already-computed result, handing it back
    /// unchanged.
    pub async fn observe_result<T, E>(
        &self,
        result: Result<T, E>,
        context: Option<ErrorContext>,
    ) -> Result<T, E>
    where
        E: std::error::Error,
    {
        if let Err(e) = &result {
            self.log_error(RawError::from_error(e), context).await;
        }
        result
    }

    /// Read errors back from the store, newest first.
    pub async fn get_errors(
        &self,
        filters: Option<ErrorFilters>,
    ) -> Result<Vec<ErrorRecord>, StoreError> {
        let query = RowQuery::from(filters.unwrap_or_default());
        let rows = self.store.query_rows(ERROR_LOGS_TABLE, query).await?;
        Ok(rows.into_iter().map(ErrorRecord::from).collect())
    }

    /// Mark a stored error resolved. Fails with [`StoreError::NotFound`]
    /// when no row has this id.
    pub async fn mark_error_resolved(&self, id: &str) -> Result<(), StoreError> {
        let affected = self
            .store
            .update_row(ERROR_LOGS_TABLE, id, RowPatch::resolve())
            .await?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("error log {}", id)));
        }
        debug!("Marked error {} resolved", id);
        Ok(())
    }

    /// Flush one batch right now. Returns how many rows were written.
    pub async fn flush(&self) -> usize {
        self.worker.flush_once().await
    }

    /// How many captured errors are waiting for the store.
    pub fn pending(&self) -> usize {
        self.worker.queue.lock().unwrap().len()
    }

    /// Stop the flush task after a final drain of the queue. Waits at most
    /// one flush interval for the drain, then aborts. Safe to call more
    /// than once.
    pub async fn shutdown(&self) {
        let handle = self.task.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };
        self.stop.notify_one();
        let abort = handle.abort_handle();
        if tokio::time::timeout(self.config.flush_interval(), handle)
            .await
            .is_err()
        {
            warn!(
                "Final flush did not finish within {:?}, aborting",
                self.config.flush_interval()
            );
            abort.abort();
        }
    }
}

impl Drop for ErrorLogger {
    fn drop(&mut self) {
        // Without a shutdown() the task must not outlive the logger.
        if let Ok(slot) = self.task.get_mut() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Mirror a captured record to the process log, level by severity.
fn mirror(record: &ErrorRecord) {
    match record.severity {
        ErrorSeverity::Critical | ErrorSeverity::High => error!(
            "Captured {} ({}): {}",
            record.severity, record.category, record.details.message
        ),
        ErrorSeverity::Medium => warn!(
            "Captured {} ({}): {}",
            record.severity, record.category, record.details.message
        ),
        ErrorSeverity::Low => info!(
            "Captured {} ({}): {}",
            record.severity, record.category, record.details.message
        ),
    }
}

// ============================================================
// Process-wide logger
// ============================================================

static GLOBAL: OnceCell<Arc<ErrorLogger>> = OnceCell::new();

/// Install a logger as the process-wide default. Returns false if one is
/// already installed; the first install wins.
pub fn install_global(logger: Arc<ErrorLogger>) -> bool {
    GLOBAL.set(logger).is_ok()
}

/// The process-wide logger, if one was installed.
pub fn global() -> Option<Arc<ErrorLogger>> {
    GLOBAL.get().cloned()
}
