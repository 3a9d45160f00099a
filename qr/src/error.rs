//! Replication error types

use thiserror::Error;

/// Errors raised on the replication paths
///
/// Receive-side failures are logged and dropped by the subscription loop so
/// one bad frame cannot stop replication for every task sharing the broker.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("envelope serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(String),
}
