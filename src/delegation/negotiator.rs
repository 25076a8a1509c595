//! Access negotiation with the coordinator quorum
//!
//! Coordinators are asked in configured order. The first `Success` grants
//! access and the first `Denied` refuses it; neither is second-guessed by
//! asking another coordinator. Errors and timeouts count as `Unreachable` and
//! move on to the next coordinator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::conf::{DelegationConfig, DEFAULT_ACCESS_RETRY_INTERVAL_MS, DEFAULT_ACCESS_TIMEOUT_MS};
use crate::coordinator::{AccessRequest, AccessResult, CoordinatorClient};
use crate::error::CoordinatorError;

/// Timeout and retry settings for a negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationPolicy {
    /// Bound on each `check_access` call
    pub timeout: Duration,
    /// Extra passes after a pass where every coordinator was unreachable
    pub retry_times: u32,
    pub retry_interval: Duration,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_ACCESS_TIMEOUT_MS),
            retry_times: 0,
            retry_interval: Duration::from_millis(DEFAULT_ACCESS_RETRY_INTERVAL_MS),
        }
    }
}

impl From<&DelegationConfig> for NegotiationPolicy {
    fn from(config: &DelegationConfig) -> Self {
        Self {
            timeout: config.access_timeout,
            retry_times: config.retry_times,
            retry_interval: config.retry_interval,
        }
    }
}

/// One coordinator consulted during a negotiation
#[derive(Debug, Clone, Serialize)]
pub struct AccessAttempt {
    pub coordinator: String,
    /// Zero for the first pass over the quorum
    pub pass: u32,
    pub outcome: AccessResult,
    pub elapsed_ms: u64,
}

/// Everything that happened during one negotiation
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationReport {
    pub access_id: String,
    pub tags: BTreeSet<String>,
    pub attempts: Vec<AccessAttempt>,
    pub granted: bool,
    pub decided_at: DateTime<Utc>,
}

impl NegotiationReport {
    fn new(access_id: &str, tags: &BTreeSet<String>) -> Self {
        Self {
            access_id: access_id.to_string(),
            tags: tags.clone(),
            attempts: Vec::new(),
            granted: false,
            decided_at: Utc::now(),
        }
    }

    fn finish(mut self, granted: bool) -> Self {
        self.granted = granted;
        self.decided_at = Utc::now();
        self
    }

    pub fn coordinators_contacted(&self) -> usize {
        self.attempts.len()
    }

    /// The outcome that ended negotiation, if any coordinator gave one
    pub fn final_outcome(&self) -> Option<&AccessResult> {
        self.attempts
            .last()
            .map(|a| &a.outcome)
            .filter(|outcome| outcome.is_final())
    }
}

/// Decides whether the job may use the remote shuffle service
#[derive(Debug, Clone, Default)]
pub struct AccessNegotiator {
    policy: NegotiationPolicy,
}

impl AccessNegotiator {
    pub fn new(policy: NegotiationPolicy) -> Self {
        Self { policy }
    }

    /// Returns `true` if some coordinator granted access before any denied it
    pub async fn negotiate<C: CoordinatorClient>(
        &self,
        access_id: &str,
        coordinators: &[C],
        tags: &BTreeSet<String>,
    ) -> bool {
        self.negotiate_with_report(access_id, coordinators, tags)
            .await
            .granted
    }

    pub async fn negotiate_with_report<C: CoordinatorClient>(
        &self,
        access_id: &str,
        coordinators: &[C],
        tags: &BTreeSet<String>,
    ) -> NegotiationReport {
        let access_id = access_id.trim();
        let mut report = NegotiationReport::new(access_id, tags);

        if access_id.is_empty() {
            warn!("Access id is empty, skip remote shuffle negotiation");
            return report.finish(false);
        }
        if coordinators.is_empty() {
            warn!("No coordinator configured, skip remote shuffle negotiation");
            return report.finish(false);
        }

        let request = AccessRequest::new(access_id, tags.clone(), self.policy.timeout);

        for pass in 0..=self.policy.retry_times {
            if pass > 0 {
                info!(
                    "All coordinators unreachable, retry access in {}ms ({}/{})",
                    self.policy.retry_interval.as_millis(),
                    pass,
                    self.policy.retry_times
                );
                tokio::time::sleep(self.policy.retry_interval).await;
            }

            for coordinator in coordinators {
                let desc = coordinator.describe();
                let started = Instant::now();
                let outcome = self.check_access(coordinator, &request).await;
                debug!(
                    "Access check against {} returned {} in {:?}",
                    desc,
                    outcome.as_str(),
                    started.elapsed()
                );

                report.attempts.push(AccessAttempt {
                    coordinator: desc.clone(),
                    pass,
                    outcome: outcome.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });

                match outcome {
                    AccessResult::Success => {
                        info!("Success to access cluster {} using {}", desc, access_id);
                        return report.finish(true);
                    }
                    AccessResult::Denied(reason) => {
                        warn!(
                            "Request to access cluster {} is denied using {} for {}",
                            desc, access_id, reason
                        );
                        return report.finish(false);
                    }
                    AccessResult::Unreachable(reason) => {
                        warn!("Fail to reach cluster {} for {}", desc, reason);
                    }
                }
            }
        }

        report.finish(false)
    }

    async fn check_access<C: CoordinatorClient>(
        &self,
        coordinator: &C,
        request: &AccessRequest,
    ) -> AccessResult {
        match tokio::time::timeout(self.policy.timeout, coordinator.check_access(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => AccessResult::Unreachable(e.to_string()),
            Err(_) => AccessResult::Unreachable(
                CoordinatorError::Timeout(self.policy.timeout).to_string(),
            ),
        }
    }
}
