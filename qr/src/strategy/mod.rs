//! Replication transport SPI
//!
//! A strategy carries envelopes between server instances over some ordered
//! pub/sub broker. The queue layer never sees broker specifics: it publishes
//! and it registers one handler for everything that arrives.

mod in_process;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::envelope::Envelope;
use crate::error::ReplicationError;

pub use in_process::{InProcessBroker, InProcessStrategy};

/// Handler invoked for every envelope observed on the broker
pub type RemoteHandler = Arc<dyn Fn(String, Envelope) -> BoxFuture<'static, ()> + Send + Sync>;

/// Transport contract for cross-instance envelope propagation
///
/// Ordering: envelopes published for one task id must reach every instance in
/// publish order (brokers achieve this by keying the partition/ordering unit
/// on the task id). Cross-task ordering is unspecified. Redelivery of an
/// instance's own envelopes is permitted; de-duplication is the strategy's
/// responsibility, not the caller's.
#[async_trait]
pub trait ReplicationStrategy: Send + Sync {
    /// Best-effort publish; retry/backoff is the implementation's business
    async fn publish(&self, task_id: &str, envelope: &Envelope) -> Result<(), ReplicationError>;

    /// Register the handler for inbound envelopes
    fn subscribe(&self, handler: RemoteHandler);
}
