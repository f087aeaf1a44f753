//! Debounced email existence checks.
//!
//! Signup forms want to tell the user "this email is taken" while they
//! type, without a directory query per keystroke. [`EmailCheck`] debounces:
//! each [`set_email`](EmailCheck::set_email) re-arms a timer, and only the
//! value still current when the timer fires gets checked. Values that are
//! empty, syntactically invalid, already confirmed or already being checked
//! are skipped. Results that come back for a value the user has since
//! edited away from are discarded.

use crate::store::EmailDirectory;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// User-facing message when the directory lookup fails.
pub const CHECK_FAILED_MESSAGE: &str = "Failed to check email. Please try again.";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

/// Syntactic email check, good enough to gate directory lookups.
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Snapshot of a checker for display.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailCheckState {
    pub email: String,
    pub is_checking: bool,
    /// Whether the current email exists; `None` until a check resolves.
    pub exists: Option<bool>,
    pub error: Option<String>,
}

type ExistsCallback = Box<dyn Fn(bool) + Send + Sync>;

struct CheckState {
    email: String,
    is_checking: bool,
    exists: Option<bool>,
    error: Option<String>,
    /// Last value a check resolved for; checking it again is skipped.
    last_checked: Option<String>,
    /// Value currently at the directory, to suppress duplicate lookups.
    in_flight: Option<String>,
    timer: Option<JoinHandle<()>>,
}

impl Default for CheckState {
    fn default() -> Self {
        Self {
            email: String::new(),
            is_checking: false,
            exists: None,
            error: None,
            last_checked: None,
            in_flight: None,
            timer: None,
        }
    }
}

struct Inner<D> {
    directory: Arc<D>,
    delay: Duration,
    on_result: Option<ExistsCallback>,
    state: Mutex<CheckState>,
}

impl<D: EmailDirectory + 'static> Inner<D> {
    async fn run_check(self: Arc<Self>, value: String) {
        {
            let mut st = self.state.lock().unwrap();
            if value.is_empty() {
                st.exists = None;
                st.error = None;
                st.last_checked = None;
                return;
            }
            if !validate_email(&value) {
                st.exists = None;
                st.last_checked = None;
                return;
            }
            if st.last_checked.as_deref() == Some(value.as_str()) {
                return;
            }
            if st.in_flight.as_deref() == Some(value.as_str()) {
                return;
            }
            st.in_flight = Some(value.clone());
            st.is_checking = true;
            st.error = None;
        }

        let result = self.directory.email_exists(&value).await;

        let mut notify = None;
        {
            let mut st = self.state.lock().unwrap();
            st.is_checking = false;
            st.in_flight = None;
            match result {
                Ok(exists) => {
                    // The user may have kept typing while the lookup ran.
                    if st.email == value {
                        st.exists = Some(exists);
                        st.last_checked = Some(value);
                        notify = Some(exists);
                    } else {
                        debug!("Discarding stale email check result for {}", value);
                    }
                }
                Err(e) => {
                    warn!("Email existence check failed: {}", e);
                    st.error = Some(CHECK_FAILED_MESSAGE.to_string());
                    st.exists = None;
                    st.last_checked = None;
                }
            }
        }
        // Callback runs without the state lock held.
        if let Some(exists) = notify {
            if let Some(on_result) = &self.on_result {
                on_result(exists);
            }
        }
    }
}

/// Builds an [`EmailCheck`] over a directory.
pub struct EmailCheckBuilder<D: EmailDirectory + 'static> {
    directory: Arc<D>,
    delay: Duration,
    on_result: Option<ExistsCallback>,
}

impl<D: EmailDirectory + 'static> EmailCheckBuilder<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            delay: DEFAULT_DELAY,
            on_result: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Called with every fresh check result.
    pub fn on_result<F>(mut self, on_result: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.on_result = Some(Box::new(on_result));
        self
    }

    pub fn build(self) -> EmailCheck<D> {
        EmailCheck {
            inner: Arc::new(Inner {
                directory: self.directory,
                delay: self.delay,
                on_result: self.on_result,
                state: Mutex::new(CheckState::default()),
            }),
        }
    }
}

/// Debounced email existence checker. See the module docs.
pub struct EmailCheck<D: EmailDirectory + 'static> {
    inner: Arc<Inner<D>>,
}

impl<D: EmailDirectory + 'static> EmailCheck<D> {
    /// Checker with the default half-second delay and no callback.
    pub fn new(directory: Arc<D>) -> Self {
        EmailCheckBuilder::new(directory).build()
    }

    /// Record what the user typed and re-arm the debounce timer. Clears any
    /// previous error; a value different from the last confirmed one also
    /// clears the cached result. Must be called within a tokio runtime.
    pub fn set_email(&self, value: impl Into<String>) {
        let value = value.into();
        {
            let mut st = self.inner.state.lock().unwrap();
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
            st.error = None;
            if st.last_checked.as_deref() != Some(value.as_str()) {
                st.last_checked = None;
                st.exists = None;
            }
            st.email = value.clone();
        }
        let inner = Arc::clone(&self.inner);
        let delay = self.inner.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The check runs detached so a later set_email can only cancel
            // the wait, never strand a half-done check.
            tokio::spawn(Arc::clone(&inner).run_check(value));
        });
        self.inner.state.lock().unwrap().timer = Some(handle);
    }

    /// Check the current value right now, skipping the debounce delay.
    pub async fn check_now(&self) {
        let value = {
            let mut st = self.inner.state.lock().unwrap();
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
            st.email.clone()
        };
        Arc::clone(&self.inner).run_check(value).await;
    }

    pub fn state(&self) -> EmailCheckState {
        let st = self.inner.state.lock().unwrap();
        EmailCheckState {
            email: st.email.clone(),
            is_checking: st.is_checking,
            exists: st.exists,
            error: st.error.clone(),
        }
    }
}

impl<D: EmailDirectory + 'static> Drop for EmailCheck<D> {
    fn drop(&mut self) {
        if let Ok(mut st) = self.inner.state.lock() {
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
        }
    }
}
