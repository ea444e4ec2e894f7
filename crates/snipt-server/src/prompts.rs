use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;

use crate::client::Client;
use crate::protocol::Outbound;

/// Asks the user a yes/no question.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Resolves to `false` when the question is declined or can no longer
    /// be answered.
    async fn confirm(&self, message: &str) -> bool;
}

/// Confirmation prompts shown by the UI.
///
/// Each prompt gets an id; the answer arrives later as a `confirmResponse`
/// message and is routed back with [`ClientPrompts::resolve`].
pub struct ClientPrompts {
    client: Client,
    next_id: AtomicU64,
    pending: Mutex<FxHashMap<u64, oneshot::Sender<bool>>>,
}

impl ClientPrompts {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    /// Deliver an answer. Returns `false` for an unknown or already answered id.
    pub fn resolve(&self, prompt_id: u64, accepted: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&prompt_id);
        match sender {
            Some(sender) => sender.send(accepted).is_ok(),
            None => {
                tracing::warn!("answer for unknown prompt {prompt_id}");
                false
            }
        }
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Confirm for ClientPrompts {
    async fn confirm(&self, message: &str) -> bool {
        let prompt_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(prompt_id, sender);

        self.client.send(Outbound::Confirm {
            prompt_id,
            message: message.to_string(),
        });

        receiver.await.unwrap_or(false)
    }
}
