//! The backend decision propagated from the driver to workers

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::conf::{keys, JobConf};
use crate::error::{DelegationError, Result};

/// Whether the job uses the remote shuffle service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Remote,
    Local,
}

impl Decision {
    pub fn from_grant(granted: bool) -> Self {
        if granted {
            Decision::Remote
        } else {
            Decision::Local
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self {
            Decision::Remote => BackendKind::Remote,
            Decision::Local => BackendKind::Local,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Decision::Remote)
    }

    /// Write the decision into the job configuration shipped to workers
    pub fn record(&self, conf: &mut JobConf) {
        conf.set(keys::RSS_ENABLED, self.is_remote().to_string())
            .set(keys::SHUFFLE_MANAGER, self.backend_kind().as_str());
    }

    /// Read the decision a driver recorded.
    ///
    /// The enabled flag is the only input; a missing flag means local.
    pub fn read(conf: &JobConf) -> Result<Self> {
        conf.get_bool(keys::RSS_ENABLED, false)
            .map(Decision::from_grant)
            .map_err(|e| match e {
                DelegationError::Config(msg) => DelegationError::InvalidDecision(msg),
                other => other,
            })
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Remote => f.write_str("remote"),
            Decision::Local => f.write_str("local"),
        }
    }
}
