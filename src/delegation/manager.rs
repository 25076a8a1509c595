//! Delegating shuffle manager
//!
//! The manager handles:
//! - Choosing the backend for this process (negotiating on the driver)
//! - Forwarding every shuffle operation to that backend
//! - Shutting down the backend and the driver's coordinator clients

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::selector::BackendSelector;
use crate::backend::{
    BackendFactory, BackendKind, Role, ShuffleBlockResolver, ShuffleDependency, ShuffleHandle,
    ShuffleManager, ShuffleReader, ShuffleWriter, TaskContext,
};
use crate::conf::{coordinator_endpoints, JobConf};
use crate::coordinator::{create_coordinator_clients, CoordinatorClient};
use crate::error::Result;

/// Shuffle manager that forwards to the backend selected at startup
pub struct DelegatingManager {
    delegate: Box<dyn ShuffleManager>,
    /// Empty on workers
    coordinator_clients: Vec<Box<dyn CoordinatorClient>>,
    role: Role,
    stopped: AtomicBool,
}

impl DelegatingManager {
    /// Create the driver's manager, talking to the coordinators listed in `conf`
    pub async fn for_driver(conf: &mut JobConf, factory: &dyn BackendFactory) -> Result<Self> {
        let clients = create_coordinator_clients(&coordinator_endpoints(conf));
        Self::for_driver_with_clients(conf, factory, clients).await
    }

    /// Create the driver's manager with an explicit coordinator client set.
    ///
    /// The manager takes ownership of the clients and closes them on `stop`.
    pub async fn for_driver_with_clients(
        conf: &mut JobConf,
        factory: &dyn BackendFactory,
        coordinator_clients: Vec<Box<dyn CoordinatorClient>>,
    ) -> Result<Self> {
        let selected = BackendSelector::new(factory)
            .select_for_driver(conf, &coordinator_clients)
            .await;

        let delegate = match selected {
            Ok(delegate) => delegate,
            Err(e) => {
                close_coordinator_clients(&coordinator_clients);
                return Err(e);
            }
        };

        Ok(Self {
            delegate,
            coordinator_clients,
            role: Role::Driver,
            stopped: AtomicBool::new(false),
        })
    }

    /// Create a worker's manager from the decision the driver recorded
    pub fn for_worker(conf: &JobConf, factory: &dyn BackendFactory) -> Result<Self> {
        let delegate = BackendSelector::new(factory).select_for_worker(conf)?;
        Ok(Self {
            delegate,
            coordinator_clients: Vec::new(),
            role: Role::Worker,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn delegate(&self) -> &dyn ShuffleManager {
        self.delegate.as_ref()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.delegate.kind()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn coordinator_count(&self) -> usize {
        self.coordinator_clients.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl ShuffleManager for DelegatingManager {
    fn kind(&self) -> BackendKind {
        self.delegate.kind()
    }

    fn register_shuffle(
        &self,
        shuffle_id: u32,
        num_maps: u32,
        dependency: &ShuffleDependency,
    ) -> ShuffleHandle {
        self.delegate.register_shuffle(shuffle_id, num_maps, dependency)
    }

    fn get_writer(
        &self,
        handle: &ShuffleHandle,
        map_id: u32,
        context: &TaskContext,
    ) -> Box<dyn ShuffleWriter> {
        self.delegate.get_writer(handle, map_id, context)
    }

    fn get_reader(
        &self,
        handle: &ShuffleHandle,
        start_partition: u32,
        end_partition: u32,
        context: &TaskContext,
    ) -> Box<dyn ShuffleReader> {
        self.delegate
            .get_reader(handle, start_partition, end_partition, context)
    }

    fn unregister_shuffle(&self, shuffle_id: u32) -> bool {
        self.delegate.unregister_shuffle(shuffle_id)
    }

    fn shuffle_block_resolver(&self) -> Arc<dyn ShuffleBlockResolver> {
        self.delegate.shuffle_block_resolver()
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!("Shuffle manager already stopped");
            return;
        }

        self.delegate.stop();
        let failed = close_coordinator_clients(&self.coordinator_clients);
        info!(
            "Stopped {} shuffle manager, closed {}/{} coordinator clients",
            self.delegate.kind(),
            self.coordinator_clients.len() - failed,
            self.coordinator_clients.len()
        );
    }
}

/// Close every client, continuing past failures. Returns the number that failed.
fn close_coordinator_clients(clients: &[Box<dyn CoordinatorClient>]) -> usize {
    let mut failed = 0;
    for client in clients {
        if let Err(e) = client.close() {
            warn!("Fail to close {}: {}", client.describe(), e);
            failed += 1;
        }
    }
    failed
}
