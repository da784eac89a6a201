//! Target Collector
//!
//! Runs one complete poll of one BMC: authenticate, walk, map. Every failure is
//! folded into a [`TargetOutcome`]; nothing escapes to the coordinator.
//!
//! ```text
//! Start ─► Authenticated ─► Walked ─► Mapped ─► Done
//!   │            │   ▲         │
//!   │            ▼   │ (once)  │
//!   └──────────► Failed ◄──────┘
//! ```

use crate::error::{AuthError, WalkError};
use crate::mapper;
use crate::metrics::MetricSample;
use crate::redfish::walker::SkippedResource;
use crate::redfish::{RedfishClient, Walker};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Result classification of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetStatus {
    Success,
    PartialSuccess,
    AuthFailure,
    Unreachable,
    Timeout,
}

impl TargetStatus {
    pub const ALL: [TargetStatus; 5] = [
        TargetStatus::Success,
        TargetStatus::PartialSuccess,
        TargetStatus::AuthFailure,
        TargetStatus::Unreachable,
        TargetStatus::Timeout,
    ];

    /// Value of `redfish_scrape_status`
    pub fn code(self) -> f64 {
        match self {
            TargetStatus::Success => 0.0,
            TargetStatus::PartialSuccess => 1.0,
            TargetStatus::AuthFailure => 2.0,
            TargetStatus::Unreachable => 3.0,
            TargetStatus::Timeout => 4.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetStatus::Success => "success",
            TargetStatus::PartialSuccess => "partial_success",
            TargetStatus::AuthFailure => "auth_failure",
            TargetStatus::Unreachable => "unreachable",
            TargetStatus::Timeout => "timeout",
        }
    }

    /// Whether the poll produced device data
    pub fn is_up(self) -> bool {
        matches!(self, TargetStatus::Success | TargetStatus::PartialSuccess)
    }
}

/// Everything one poll produced
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: String,
    pub status: TargetStatus,
    pub samples: Vec<MetricSample>,
    pub elapsed: Duration,
    pub skipped: Vec<SkippedResource>,
    /// Diagnostic detail for logs, never exported
    pub error: Option<String>,
}

impl TargetOutcome {
    pub fn failed(
        target: impl Into<String>,
        status: TargetStatus,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            status,
            samples: Vec::new(),
            elapsed,
            skipped: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn timed_out(target: impl Into<String>, elapsed: Duration) -> Self {
        Self::failed(target, TargetStatus::Timeout, elapsed, "deadline exceeded")
    }
}

struct Failure {
    status: TargetStatus,
    reason: String,
}

impl From<AuthError> for Failure {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::Unreachable { .. } => TargetStatus::Unreachable,
            AuthError::InvalidCredential { .. } | AuthError::Protocol { .. } => {
                TargetStatus::AuthFailure
            }
        };
        Failure {
            status,
            reason: err.to_string(),
        }
    }
}

/// Polls one target
pub struct TargetCollector {
    client: RedfishClient,
    max_depth: usize,
    parallelism: usize,
}

impl TargetCollector {
    pub fn new(client: RedfishClient, max_depth: usize, parallelism: usize) -> Self {
        Self {
            client,
            max_depth,
            parallelism,
        }
    }

    pub fn client(&self) -> &RedfishClient {
        &self.client
    }

    pub fn address(&self) -> &str {
        self.client.address()
    }

    /// Runs a full poll, abandoning it at `deadline`.
    ///
    /// Dropping the run on expiry cancels every HTTP request still in flight.
    pub async fn collect(&self, deadline: Instant) -> TargetOutcome {
        let started = Instant::now();
        let address = self.address();

        let result = tokio::time::timeout_at(deadline, self.run()).await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(Ok((samples, skipped))) => {
                let status = if skipped.is_empty() {
                    TargetStatus::Success
                } else {
                    TargetStatus::PartialSuccess
                };
                TargetOutcome {
                    target: address.to_string(),
                    status,
                    samples,
                    elapsed,
                    skipped,
                    error: None,
                }
            }
            Ok(Err(failure)) => {
                trace!(bmc = %address, state = "Failed");
                TargetOutcome::failed(address, failure.status, elapsed, failure.reason)
            }
            Err(_) => {
                trace!(bmc = %address, state = "Failed");
                TargetOutcome::timed_out(address, elapsed)
            }
        };

        match &outcome.error {
            Some(reason) => warn!(
                bmc = %address,
                status = outcome.status.as_str(),
                error = %reason,
                "Poll failed"
            ),
            None => debug!(
                bmc = %address,
                status = outcome.status.as_str(),
                samples = outcome.samples.len(),
                skipped = outcome.skipped.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Poll finished"
            ),
        }
        trace!(bmc = %address, state = "Done");

        outcome
    }

    async fn run(&self) -> Result<(Vec<MetricSample>, Vec<SkippedResource>), Failure> {
        let address = self.address();
        trace!(bmc = %address, state = "Start");

        let mut session = self.client.authenticate().await?;
        trace!(bmc = %address, state = "Authenticated");

        let mut walker = Walker::new(self.max_depth, self.parallelism);
        let mut reauthenticated = false;
        loop {
            match walker.walk(&self.client, &session).await {
                Ok(()) => break,
                Err(WalkError::SessionExpired) if !reauthenticated => {
                    debug!(bmc = %address, "Session expired mid-walk, re-authenticating");
                    reauthenticated = true;
                    session = self.client.authenticate().await?;
                }
                Err(WalkError::SessionExpired) => {
                    return Err(Failure {
                        status: TargetStatus::AuthFailure,
                        reason: "session rejected again after re-authentication".to_string(),
                    });
                }
                Err(err @ WalkError::Essential { .. }) => {
                    return Err(Failure {
                        status: TargetStatus::Unreachable,
                        reason: err.to_string(),
                    });
                }
            }
        }
        trace!(bmc = %address, state = "Walked");

        let output = walker.finish();
        let samples = mapper::map(&output.documents, self.client.target());
        trace!(bmc = %address, state = "Mapped", samples = samples.len());

        Ok((samples, output.skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_and_ordered() {
        let codes: Vec<f64> = TargetStatus::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn only_data_producing_statuses_are_up() {
        assert!(TargetStatus::Success.is_up());
        assert!(TargetStatus::PartialSuccess.is_up());
        assert!(!TargetStatus::AuthFailure.is_up());
        assert!(!TargetStatus::Unreachable.is_up());
        assert!(!TargetStatus::Timeout.is_up());
    }

    #[test]
    fn timed_out_outcome_has_no_samples() {
        let outcome = TargetOutcome::timed_out("bmc-1", Duration::from_secs(3));
        assert_eq!(outcome.status, TargetStatus::Timeout);
        assert!(outcome.samples.is_empty());
        assert!(outcome.error.is_some());
    }
}
