//! rss-delegation - shuffle backend selection through coordinator negotiation
//!
//! At job startup the driver asks the remote shuffle service coordinators
//! whether the job may use the service. The answer decides between the remote
//! backend and the local default backend, and is propagated to every worker
//! through the shared job configuration.

pub mod backend;
pub mod conf;
pub mod coordinator;
pub mod delegation;
pub mod error;

pub use backend::{BackendFactory, BackendKind, Role, ShuffleManager};
pub use conf::{DelegationConfig, JobConf};
pub use coordinator::{AccessRequest, AccessResult, CoordinatorClient, HttpCoordinatorClient};
pub use delegation::{AccessNegotiator, BackendSelector, Decision, DelegatingManager};
pub use error::{BackendError, CoordinatorError, DelegationError, Result};
