//! Clients for the coordinators that grant remote shuffle access

pub mod client;
pub mod http;

pub use client::{AccessRequest, AccessResult, CoordinatorClient};
pub use http::{create_coordinator_clients, HttpCoordinatorClient};
