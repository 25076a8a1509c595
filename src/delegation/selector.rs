//! Backend selection for drivers and workers
//!
//! The driver negotiates, builds the backend it was granted and records the
//! decision. If the remote backend cannot be built it degrades to the local
//! one. Workers never negotiate: they build whatever the driver recorded and
//! fail loudly if they cannot.

use tracing::{info, warn};

use super::decision::Decision;
use super::negotiator::{AccessNegotiator, NegotiationPolicy};
use crate::backend::{BackendFactory, BackendKind, Role, ShuffleManager};
use crate::conf::{DelegationConfig, JobConf};
use crate::coordinator::CoordinatorClient;
use crate::error::{DelegationError, Result};

pub struct BackendSelector<'a> {
    factory: &'a dyn BackendFactory,
}

impl<'a> BackendSelector<'a> {
    pub fn new(factory: &'a dyn BackendFactory) -> Self {
        Self { factory }
    }

    /// Negotiate with `coordinators` and build the granted backend.
    ///
    /// Records the decision into `conf` on success. Fails only when the local
    /// backend cannot be built.
    pub async fn select_for_driver<C: CoordinatorClient>(
        &self,
        conf: &mut JobConf,
        coordinators: &[C],
    ) -> Result<Box<dyn ShuffleManager>> {
        let granted = match DelegationConfig::from_conf(conf) {
            Ok(config) => {
                AccessNegotiator::new(NegotiationPolicy::from(&config))
                    .negotiate(&config.access_id, coordinators, &config.assignment_tags)
                    .await
            }
            Err(e) => {
                warn!("Invalid remote shuffle access settings, skip negotiation: {}", e);
                false
            }
        };

        self.build_for_driver(conf, granted)
    }

    /// Build the driver's backend once the grant is known
    pub fn build_for_driver(
        &self,
        conf: &mut JobConf,
        granted: bool,
    ) -> Result<Box<dyn ShuffleManager>> {
        if granted {
            match self.factory.create_remote(conf, Role::Driver) {
                Ok(manager) => {
                    Decision::Remote.record(conf);
                    info!("Use remote shuffle manager");
                    return Ok(manager);
                }
                Err(e) => {
                    warn!(
                        "Fail to create remote shuffle manager, fallback to local shuffle manager: {}",
                        e
                    );
                }
            }
        }

        let manager = self
            .factory
            .create_local(conf, Role::Driver)
            .map_err(DelegationError::LocalBackendUnavailable)?;
        Decision::Local.record(conf);
        info!("Use local shuffle manager");
        Ok(manager)
    }

    /// Build the backend the driver recorded into `conf`
    pub fn select_for_worker(&self, conf: &JobConf) -> Result<Box<dyn ShuffleManager>> {
        match Decision::read(conf)? {
            Decision::Remote => {
                // No fallback here: the driver already committed the job to the remote service.
                let manager = self
                    .factory
                    .create_remote(conf, Role::Worker)
                    .map_err(|source| DelegationError::WorkerBackendMismatch {
                        kind: BackendKind::Remote,
                        source,
                    })?;
                info!("Use remote shuffle manager");
                Ok(manager)
            }
            Decision::Local => {
                let manager = self
                    .factory
                    .create_local(conf, Role::Worker)
                    .map_err(DelegationError::LocalBackendUnavailable)?;
                info!("Use local shuffle manager");
                Ok(manager)
            }
        }
    }
}
