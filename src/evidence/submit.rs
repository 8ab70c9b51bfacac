//! Best-effort remote submission
//!
//! A single form-encoded POST to the configured endpoint. The response is
//! never parsed; delivery failure is logged, never retried and never
//! surfaced to the learner. The local record write is the durability
//! guarantee, so the remote side is strictly optional.
//!
//! Known gap carried over from the source: the request has no timeout, so
//! a hung endpoint leaves the caller waiting. Documented rather than
//! silently hardened.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::SubmissionConfig;

/// Where a submission ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The POST was sent and the server answered something
    Delivered,
    /// Remote send failed or was not configured; local state holds
    Offline,
}

impl SubmitOutcome {
    pub fn is_offline(self) -> bool {
        matches!(self, SubmitOutcome::Offline)
    }
}

/// Sink for evidence field sets; the production sink posts a form
pub trait RemoteSink: Send + Sync {
    fn deliver(&self, fields: &[(String, String)]) -> Result<()>;
}

/// Form-POST sink over the configured endpoint with its field mapping
pub struct FormEndpoint {
    endpoint: String,
    fields: BTreeMap<String, String>,
    client: reqwest::blocking::Client,
}

impl FormEndpoint {
    pub fn new(config: &SubmissionConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            fields: config.fields.clone(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Rename logical field names to their configured form names,
    /// dropping fields with no mapping
    fn map_fields(&self, fields: &[(String, String)]) -> Vec<(String, String)> {
        fields
            .iter()
            .filter_map(|(logical, value)| {
                self.fields
                    .get(logical)
                    .map(|form_name| (form_name.clone(), value.clone()))
            })
            .collect()
    }
}

impl RemoteSink for FormEndpoint {
    fn deliver(&self, fields: &[(String, String)]) -> Result<()> {
        let form = self.map_fields(fields);
        self.client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .context("Evidence form POST failed")?;
        // Response body is deliberately ignored: no acknowledgment contract
        Ok(())
    }
}

/// Sink used when no submission target is configured
pub struct DisabledSink;

impl RemoteSink for DisabledSink {
    fn deliver(&self, _fields: &[(String, String)]) -> Result<()> {
        anyhow::bail!("remote submission not configured")
    }
}

/// Fire-and-forget send: failure is downgraded to [`SubmitOutcome::Offline`]
pub fn send_best_effort(sink: &dyn RemoteSink, fields: &[(String, String)]) -> SubmitOutcome {
    match sink.deliver(fields) {
        Ok(()) => {
            info!("Evidence submission delivered");
            SubmitOutcome::Delivered
        }
        Err(e) => {
            warn!("Evidence submission stayed local: {}", e);
            SubmitOutcome::Offline
        }
    }
}
