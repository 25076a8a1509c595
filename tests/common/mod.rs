//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rss_delegation::backend::{
    BackendFactory, BackendKind, Role, ShuffleBlockResolver, ShuffleDependency, ShuffleHandle,
    ShuffleManager, ShuffleReader, ShuffleWriter, TaskContext,
};
use rss_delegation::{AccessRequest, AccessResult, BackendError, CoordinatorClient, CoordinatorError, JobConf};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum Reply {
    Grant,
    Deny(&'static str),
    Down,
    Broken,
}

/// Coordinator that answers from a script and remembers what it was asked
pub struct ScriptedCoordinator {
    name: String,
    reply: Reply,
    fail_close: bool,
    requests: Mutex<Vec<AccessRequest>>,
    closes: AtomicUsize,
}

impl ScriptedCoordinator {
    pub fn new(name: &str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply,
            fail_close: false,
            requests: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn failing_close(name: &str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply,
            fail_close: true,
            requests: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<AccessRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinatorClient for ScriptedCoordinator {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResult, CoordinatorError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Grant => Ok(AccessResult::Success),
            Reply::Deny(reason) => Ok(AccessResult::Denied(reason.to_string())),
            Reply::Down => Ok(AccessResult::Unreachable("coordinator is starting".to_string())),
            Reply::Broken => Err(CoordinatorError::Protocol("unexpected body".to_string())),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn close(&self) -> Result<(), CoordinatorError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(CoordinatorError::Protocol("channel already shut down".to_string()));
        }
        Ok(())
    }
}

/// Build scripted coordinators named c1, c2, ... and the boxed client set a driver owns
pub fn quorum(replies: &[Reply]) -> (Vec<Arc<ScriptedCoordinator>>, Vec<Box<dyn CoordinatorClient>>) {
    let coordinators: Vec<Arc<ScriptedCoordinator>> = replies
        .iter()
        .enumerate()
        .map(|(i, reply)| ScriptedCoordinator::new(&format!("c{}", i + 1), reply.clone()))
        .collect();
    let clients = coordinators
        .iter()
        .map(|c| Box::new(c.clone()) as Box<dyn CoordinatorClient>)
        .collect();
    (coordinators, clients)
}

pub fn total_calls(coordinators: &[Arc<ScriptedCoordinator>]) -> usize {
    coordinators.iter().map(|c| c.calls()).sum()
}

pub struct FakeBackend {
    kind: BackendKind,
    stops: Arc<AtomicUsize>,
}

struct FakeWriter {
    shuffle_id: u32,
    map_id: u32,
}

impl ShuffleWriter for FakeWriter {
    fn shuffle_id(&self) -> u32 {
        self.shuffle_id
    }

    fn map_id(&self) -> u32 {
        self.map_id
    }
}

struct FakeReader {
    shuffle_id: u32,
    partitions: Range<u32>,
}

impl ShuffleReader for FakeReader {
    fn shuffle_id(&self) -> u32 {
        self.shuffle_id
    }

    fn partitions(&self) -> Range<u32> {
        self.partitions.clone()
    }
}

struct FakeResolver(BackendKind);

impl ShuffleBlockResolver for FakeResolver {
    fn backend(&self) -> BackendKind {
        self.0
    }
}

impl ShuffleManager for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn register_shuffle(
        &self,
        shuffle_id: u32,
        num_maps: u32,
        dependency: &ShuffleDependency,
    ) -> ShuffleHandle {
        ShuffleHandle {
            shuffle_id,
            num_maps,
            num_partitions: dependency.num_partitions,
            backend: self.kind,
        }
    }

    fn get_writer(&self, handle: &ShuffleHandle, map_id: u32, _context: &TaskContext) -> Box<dyn ShuffleWriter> {
        Box::new(FakeWriter {
            shuffle_id: handle.shuffle_id,
            map_id,
        })
    }

    fn get_reader(
        &self,
        handle: &ShuffleHandle,
        start_partition: u32,
        end_partition: u32,
        _context: &TaskContext,
    ) -> Box<dyn ShuffleReader> {
        Box::new(FakeReader {
            shuffle_id: handle.shuffle_id,
            partitions: start_partition..end_partition,
        })
    }

    fn unregister_shuffle(&self, _shuffle_id: u32) -> bool {
        true
    }

    fn shuffle_block_resolver(&self) -> Arc<dyn ShuffleBlockResolver> {
        Arc::new(FakeResolver(self.kind))
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory whose constructions can be made to fail
#[derive(Default)]
pub struct FakeFactory {
    pub remote_fails: bool,
    pub local_fails: bool,
    built: Mutex<Vec<(BackendKind, Role)>>,
    stops: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broken_remote() -> Self {
        Self {
            remote_fails: true,
            ..Self::default()
        }
    }

    pub fn with_nothing_working() -> Self {
        Self {
            remote_fails: true,
            local_fails: true,
            ..Self::default()
        }
    }

    pub fn built(&self) -> Vec<(BackendKind, Role)> {
        self.built.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn build(&self, kind: BackendKind, role: Role, fails: bool) -> Result<Box<dyn ShuffleManager>, BackendError> {
        self.built.lock().unwrap().push((kind, role));
        if fails {
            return Err(BackendError::new(format!("cannot start {} backend", kind)));
        }
        Ok(Box::new(FakeBackend {
            kind,
            stops: self.stops.clone(),
        }))
    }
}

impl BackendFactory for FakeFactory {
    fn create_remote(&self, _conf: &JobConf, role: Role) -> Result<Box<dyn ShuffleManager>, BackendError> {
        self.build(BackendKind::Remote, role, self.remote_fails)
    }

    fn create_local(&self, _conf: &JobConf, role: Role) -> Result<Box<dyn ShuffleManager>, BackendError> {
        self.build(BackendKind::Local, role, self.local_fails)
    }
}
