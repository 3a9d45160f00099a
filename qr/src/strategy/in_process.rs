//! In-process reference strategy
//!
//! A shared in-memory bus standing in for a real broker. Each simulated
//! server instance takes one [`InProcessStrategy`] handle from the broker;
//! `publish` serializes the envelope and synchronously delivers the decoded
//! copy to every *other* handle's handler. Self-delivery suppression is this
//! strategy's de-duplication, and the JSON round-trip keeps the wire format
//! and the fail-closed decode path honest in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{trace, warn};

use crate::envelope::Envelope;
use crate::error::ReplicationError;

use super::{RemoteHandler, ReplicationStrategy};

struct Subscriber {
    instance: u64,
    handler: RemoteHandler,
}

#[derive(Default)]
struct BrokerShared {
    subscribers: Mutex<Vec<Subscriber>>,
    next_instance: AtomicU64,
}

/// Shared in-memory bus connecting simulated instances
#[derive(Clone, Default)]
pub struct InProcessBroker {
    shared: Arc<BrokerShared>,
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a strategy handle representing one server instance
    pub fn strategy(&self) -> InProcessStrategy {
        InProcessStrategy {
            shared: Arc::clone(&self.shared),
            instance: self.shared.next_instance.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// One instance's view of the in-process bus
pub struct InProcessStrategy {
    shared: Arc<BrokerShared>,
    instance: u64,
}

#[async_trait]
impl ReplicationStrategy for InProcessStrategy {
    async fn publish(&self, task_id: &str, envelope: &Envelope) -> Result<(), ReplicationError> {
        let frame = envelope.to_json()?;
        trace!(%task_id, instance = self.instance, "publishing envelope");

        let handlers: Vec<RemoteHandler> = self
            .shared
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|subscriber| subscriber.instance != self.instance)
            .map(|subscriber| Arc::clone(&subscriber.handler))
            .collect();

        for handler in handlers {
            match Envelope::from_json(&frame) {
                Ok(envelope) => handler(task_id.to_string(), envelope).await,
                Err(err) => {
                    // Fail closed: one bad frame must not stop the bus
                    warn!(%task_id, %err, "dropping malformed envelope");
                }
            }
        }
        Ok(())
    }

    fn subscribe(&self, handler: RemoteHandler) {
        self.shared.subscribers.lock().unwrap().push(Subscriber {
            instance: self.instance,
            handler,
        });
    }
}
