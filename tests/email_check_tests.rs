//! Tests for the debounced email existence checker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use faultline::store::{EmailDirectory, MemoryStore, StoreError};
use faultline::{EmailCheck, EmailCheckBuilder, CHECK_FAILED_MESSAGE};

const KNOWN: &str = "known@example.com";

fn directory() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_emails(&[KNOWN]))
}

/// Directory that answers after a fixed latency, for races between typing
/// and an in-flight lookup.
struct SlowDirectory {
    inner: Arc<MemoryStore>,
    latency: Duration,
}

#[async_trait]
impl EmailDirectory for SlowDirectory {
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        tokio::time::sleep(self.latency).await;
        self.inner.email_exists(email).await
    }
}

#[tokio::test]
async fn test_check_waits_for_debounce_delay() {
    let dir = directory();
    let check = EmailCheckBuilder::new(dir.clone())
        .delay(Duration::from_millis(100))
        .build();

    check.set_email(KNOWN);
    assert_eq!(dir.email_calls(), 0);
    assert_eq!(check.state().email, KNOWN);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(dir.email_calls(), 1);
    let state = check.state();
    assert!(!state.is_checking);
    assert_eq!(state.exists, Some(true));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_rapid_typing_checks_only_final_value() {
    let dir = directory();
    let check = EmailCheckBuilder::new(dir.clone())
        .delay(Duration::from_millis(100))
        .build();

    check.set_email("k@example.com");
    tokio::time::sleep(Duration::from_millis(30)).await;
    check.set_email("kn@example.com");
    tokio::time::sleep(Duration::from_millis(30)).await;
    check.set_email(KNOWN);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(dir.email_calls(), 1);
    assert_eq!(check.state().exists, Some(true));
}

#[tokio::test]
async fn test_confirmed_value_not_rechecked() {
    let dir = directory();
    let check = EmailCheck::new(dir.clone());

    check.set_email(KNOWN);
    check.check_now().await;
    assert_eq!(dir.email_calls(), 1);
    assert_eq!(check.state().exists, Some(true));

    check.set_email(KNOWN);
    check.check_now().await;
    assert_eq!(dir.email_calls(), 1);
    assert_eq!(check.state().exists, Some(true));
}

#[tokio::test]
async fn test_changed_value_rechecked() {
    let dir = directory();
    let check = EmailCheck::new(dir.clone());

    check.set_email(KNOWN);
    check.check_now().await;
    assert_eq!(check.state().exists, Some(true));

    check.set_email("absent@example.com");
    // The cached verdict belongs to the old value.
    assert_eq!(check.state().exists, None);

    check.check_now().await;
    assert_eq!(dir.email_calls(), 2);
    assert_eq!(check.state().exists, Some(false));
}

#[tokio::test]
async fn test_invalid_email_never_reaches_directory() {
    let dir = directory();
    let check = EmailCheck::new(dir.clone());

    check.set_email("not-an-email");
    check.check_now().await;

    assert_eq!(dir.email_calls(), 0);
    let state = check.state();
    assert_eq!(state.exists, None);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_empty_email_resets_state() {
    let dir = directory();
    let check = EmailCheck::new(dir.clone());

    check.set_email(KNOWN);
    check.check_now().await;
    assert_eq!(check.state().exists, Some(true));

    check.set_email("");
    check.check_now().await;

    assert_eq!(dir.email_calls(), 1);
    let state = check.state();
    assert!(state.email.is_empty());
    assert_eq!(state.exists, None);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_lookup_failure_sets_error_and_retry_works() {
    let dir = directory();
    dir.fail_next_email_checks(1);
    let check = EmailCheck::new(dir.clone());

    check.set_email(KNOWN);
    check.check_now().await;
    let state = check.state();
    assert_eq!(state.error.as_deref(), Some(CHECK_FAILED_MESSAGE));
    assert_eq!(state.exists, None);

    // A failed value is not cached, so the same value can be retried.
    check.check_now().await;
    assert_eq!(dir.email_calls(), 2);
    let state = check.state();
    assert_eq!(state.exists, Some(true));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_on_result_callback_sees_fresh_results() {
    let dir = directory();
    let seen: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let check = EmailCheckBuilder::new(dir.clone())
        .on_result(move |exists| sink.lock().unwrap().push(exists))
        .build();

    check.set_email(KNOWN);
    check.check_now().await;
    check.set_email("absent@example.com");
    check.check_now().await;

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn test_check_now_skips_the_delay() {
    let dir = directory();
    let check = EmailCheckBuilder::new(dir.clone())
        .delay(Duration::from_secs(60))
        .build();

    check.set_email(KNOWN);
    check.check_now().await;

    assert_eq!(dir.email_calls(), 1);
    assert_eq!(check.state().exists, Some(true));
}

#[tokio::test]
async fn test_result_for_edited_away_value_is_discarded() {
    let inner = directory();
    let dir = Arc::new(SlowDirectory {
        inner: inner.clone(),
        latency: Duration::from_millis(150),
    });
    let seen: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let check = EmailCheckBuilder::new(dir)
        .delay(Duration::from_millis(10))
        .on_result(move |exists| sink.lock().unwrap().push(exists))
        .build();

    // The lookup for the known address is still in flight when the user
    // keeps typing; its verdict must not be applied to the new value.
    check.set_email(KNOWN);
    tokio::time::sleep(Duration::from_millis(50)).await;
    check.set_email("absent@example.com");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(inner.email_calls(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![false]);
    let state = check.state();
    assert_eq!(state.email, "absent@example.com");
    assert_eq!(state.exists, Some(false));
}
