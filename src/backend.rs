//! Shuffle backend capabilities
//!
//! The remote and local shuffle backends live outside this crate. They are
//! reached through [`ShuffleManager`] and produced by a [`BackendFactory`]
//! supplied by the embedding application.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

use crate::conf::JobConf;
use crate::error::BackendError;

/// Which kind of shuffle backend a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Remote shuffle service
    Remote,
    /// Local sort-based shuffle
    Local,
}

impl BackendKind {
    /// Manager name recorded into the job configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "rss",
            BackendKind::Local => "sort",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rss" => Ok(BackendKind::Remote),
            "sort" => Ok(BackendKind::Local),
            _ => Err(format!("Invalid shuffle manager: {}", s)),
        }
    }
}

/// Role of the current process within the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Worker,
}

/// Shape of the data being shuffled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleDependency {
    pub num_partitions: u32,
    #[serde(default)]
    pub map_side_combine: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer: Option<String>,
}

/// Handle returned by `register_shuffle`, passed back to writers and readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleHandle {
    pub shuffle_id: u32,
    pub num_maps: u32,
    pub num_partitions: u32,
    pub backend: BackendKind,
}

/// Task attempt information handed to writers and readers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    pub stage_id: u32,
    pub stage_attempt: u32,
    pub partition_id: u32,
    pub task_attempt_id: u64,
}

pub trait ShuffleWriter: Send {
    fn shuffle_id(&self) -> u32;
    fn map_id(&self) -> u32;
}

pub trait ShuffleReader: Send {
    fn shuffle_id(&self) -> u32;
    fn partitions(&self) -> Range<u32>;
}

pub trait ShuffleBlockResolver: Send + Sync {
    fn backend(&self) -> BackendKind;
}

/// Operational interface every shuffle backend provides
pub trait ShuffleManager: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn register_shuffle(
        &self,
        shuffle_id: u32,
        num_maps: u32,
        dependency: &ShuffleDependency,
    ) -> ShuffleHandle;

    fn get_writer(
        &self,
        handle: &ShuffleHandle,
        map_id: u32,
        context: &TaskContext,
    ) -> Box<dyn ShuffleWriter>;

    fn get_reader(
        &self,
        handle: &ShuffleHandle,
        start_partition: u32,
        end_partition: u32,
        context: &TaskContext,
    ) -> Box<dyn ShuffleReader>;

    fn unregister_shuffle(&self, shuffle_id: u32) -> bool;

    fn shuffle_block_resolver(&self) -> Arc<dyn ShuffleBlockResolver>;

    fn stop(&self);
}

/// Constructs the concrete backends
pub trait BackendFactory: Send + Sync {
    fn create_remote(
        &self,
        conf: &JobConf,
        role: Role,
    ) -> Result<Box<dyn ShuffleManager>, BackendError>;

    fn create_local(
        &self,
        conf: &JobConf,
        role: Role,
    ) -> Result<Box<dyn ShuffleManager>, BackendError>;

    fn create(
        &self,
        kind: BackendKind,
        conf: &JobConf,
        role: Role,
    ) -> Result<Box<dyn ShuffleManager>, BackendError> {
        match kind {
            BackendKind::Remote => self.create_remote(conf, role),
            BackendKind::Local => self.create_local(conf, role),
        }
    }
}
