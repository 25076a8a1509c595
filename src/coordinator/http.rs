//! HTTP coordinator client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use super::client::{AccessRequest, AccessResult, CoordinatorClient};
use crate::error::CoordinatorError;

const ACCESS_PATH: &str = "/v1/access";

/// Coordinator client speaking JSON over HTTP
pub struct HttpCoordinatorClient {
    client: Client,
    base_url: String,
    closed: AtomicBool,
}

impl HttpCoordinatorClient {
    /// Create a client for `endpoint`, which may omit the `http://` scheme
    pub fn new(endpoint: &str) -> Result<Self, CoordinatorError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: normalize_endpoint(endpoint),
            closed: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl CoordinatorClient for HttpCoordinatorClient {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResult, CoordinatorError> {
        if self.is_closed() {
            return Err(CoordinatorError::Closed);
        }

        let body = AccessClusterRequest {
            access_id: &request.access_id,
            tags: &request.tags,
            timeout_ms: request.timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, ACCESS_PATH))
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Ok(AccessResult::Unreachable(format!("HTTP {} - {}", status, text)));
        }

        let response: AccessClusterResponse = response
            .json()
            .await
            .map_err(|e| CoordinatorError::Protocol(e.to_string()))?;

        Ok(response.into_result())
    }

    fn describe(&self) -> String {
        format!("coordinator http client ref to {}", self.base_url)
    }

    fn close(&self) -> Result<(), CoordinatorError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CoordinatorError::Closed);
        }
        Ok(())
    }
}

/// Build one client per endpoint, keeping the configured order.
///
/// Endpoints whose client cannot be built are logged and skipped.
pub fn create_coordinator_clients(endpoints: &[String]) -> Vec<Box<dyn CoordinatorClient>> {
    let mut clients: Vec<Box<dyn CoordinatorClient>> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        match HttpCoordinatorClient::new(endpoint) {
            Ok(client) => clients.push(Box::new(client)),
            Err(e) => tracing::warn!("Fail to create coordinator client for {}: {}", endpoint, e),
        }
    }
    clients
}

fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct AccessClusterRequest<'a> {
    access_id: &'a str,
    tags: &'a BTreeSet<String>,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct AccessClusterResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl AccessClusterResponse {
    fn into_result(self) -> AccessResult {
        let message = self.message.unwrap_or_default();
        match self.status.as_str() {
            "SUCCESS" => AccessResult::Success,
            "ACCESS_DENIED" => AccessResult::Denied(message),
            other => AccessResult::Unreachable(format!("{}: {}", other, message)),
        }
    }
}
