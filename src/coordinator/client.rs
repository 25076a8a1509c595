//! Coordinator client capability

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoordinatorError;

/// One access check sent to a coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub access_id: String,
    pub tags: BTreeSet<String>,
    pub timeout: Duration,
}

impl AccessRequest {
    pub fn new(access_id: impl Into<String>, tags: BTreeSet<String>, timeout: Duration) -> Self {
        Self {
            access_id: access_id.into(),
            tags,
            timeout,
        }
    }
}

/// Outcome of a single access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AccessResult {
    /// Access granted; negotiation stops with a grant
    Success,
    /// Authoritative denial; negotiation stops without trying other coordinators
    Denied(String),
    /// The coordinator could not answer; the next one is tried
    Unreachable(String),
}

impl AccessResult {
    /// Whether this outcome ends negotiation
    pub fn is_final(&self) -> bool {
        !matches!(self, AccessResult::Unreachable(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessResult::Success => "success",
            AccessResult::Denied(_) => "denied",
            AccessResult::Unreachable(_) => "unreachable",
        }
    }
}

#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResult, CoordinatorError>;

    /// Human readable identity used in logs
    fn describe(&self) -> String;

    fn close(&self) -> Result<(), CoordinatorError>;
}

#[async_trait]
impl CoordinatorClient for Box<dyn CoordinatorClient> {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResult, CoordinatorError> {
        (**self).check_access(request).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn close(&self) -> Result<(), CoordinatorError> {
        (**self).close()
    }
}

#[async_trait]
impl<T: CoordinatorClient + ?Sized> CoordinatorClient for Arc<T> {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResult, CoordinatorError> {
        (**self).check_access(request).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn close(&self) -> Result<(), CoordinatorError> {
        (**self).close()
    }
}
