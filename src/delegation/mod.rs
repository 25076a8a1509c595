//! Delegated shuffle backend selection
//!
//! The driver negotiates remote shuffle access with the coordinator quorum,
//! records the outcome in the job configuration, and every worker builds the
//! same backend from that record without negotiating itself.

pub mod decision;
pub mod manager;
pub mod negotiator;
pub mod selector;

pub use decision::Decision;
pub use manager::DelegatingManager;
pub use negotiator::{AccessAttempt, AccessNegotiator, NegotiationPolicy, NegotiationReport};
pub use selector::BackendSelector;
