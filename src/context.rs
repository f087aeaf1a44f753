//! Completing partial error context with configured facts.

use crate::config::{ReportingConfig, Runtime};
use crate::types::ErrorContext;
use chrono::{DateTime, Utc};

/// Holds the deploy-time facts every record gets stamped with: environment,
/// version, runtime, and on Client runtime the page url / user agent the
/// host injected at construction.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    environment: String,
    version: Option<String>,
    runtime: Runtime,
    url: Option<String>,
    user_agent: Option<String>,
}

impl ContextBuilder {
    pub fn new(environment: impl Into<String>, runtime: Runtime) -> Self {
        Self {
            environment: environment.into(),
            version: None,
            runtime,
            url: None,
            user_agent: None,
        }
    }

    pub fn from_config(config: &ReportingConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            version: config.version.clone(),
            runtime: config.runtime,
            url: None,
            user_agent: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Complete a partial context. Whatever the caller set survives; only
    /// unset fields are stamped. The timestamp sentinel is the epoch, the
    /// environment sentinel the empty string. Page fields are stamped only
    /// on Client runtime.
    pub fn build(&self, partial: Option<ErrorContext>) -> ErrorContext {
        let mut ctx = partial.unwrap_or_default();
        if ctx.timestamp == DateTime::<Utc>::default() {
            ctx.timestamp = Utc::now();
        }
        if ctx.environment.is_empty() {
            ctx.environment = self.environment.clone();
        }
        if ctx.version.is_none() {
            ctx.version = self.version.clone();
        }
        if self.runtime == Runtime::Client {
            if ctx.url.is_none() {
                ctx.url = self.url.clone();
            }
            if ctx.user_agent.is_none() {
                ctx.user_agent = self.user_agent.clone();
            }
        }
        ctx
    }

    /// Overwrite the context's page fields with the configured ones when
    /// present. Used by the client entrypoint, where the injected page
    /// facts win over whatever the caller passed.
    pub fn stamp_client(&self, ctx: &mut ErrorContext) {
        if let Some(url) = &self.url {
            ctx.url = Some(url.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            ctx.user_agent = Some(user_agent.clone());
        }
    }

    /// Overwrite the context's environment with the configured one. Used by
    /// the server entrypoint.
    pub fn stamp_environment(&self, ctx: &mut ErrorContext) {
        ctx.environment = self.environment.clone();
    }
}
