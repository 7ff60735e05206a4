//! Background writer that applies cart persistence in mutation order.

use alloc::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use super::CART_KEY;
use crate::error::FoodCartError;
use crate::models::CartSnapshot;
use crate::storage::Storage;

/// Callback receiving persistence failures.
pub type PersistErrorHook = Arc<dyn Fn(&FoodCartError) + Send + Sync>;

/// Work item for the writer task.
#[derive(Debug)]
enum PersistCommand {
    /// Store the serialized snapshot.
    Write(String),
    /// Delete the persisted snapshot.
    Remove,
    /// Signal once everything queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Sending half of the writer queue, owned by the cart.
pub(super) struct PersistQueue {
    /// Queue into the writer task.
    tx: mpsc::UnboundedSender<PersistCommand>,
    /// Where failures are reported.
    hook: PersistErrorHook,
}

impl core::fmt::Debug for PersistQueue {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PersistQueue")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl PersistQueue {
    /// Spawns the writer on `runtime` and returns its queue.
    pub(super) fn spawn<S: Storage>(
        runtime: &Handle,
        storage: Arc<S>,
        hook: PersistErrorHook,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _writer = runtime.spawn(run_writer(storage, rx, Arc::clone(&hook)));
        Self { tx, hook }
    }

    /// Queues the snapshot, or a delete when it is empty.
    pub(super) fn save(&self, snapshot: &CartSnapshot) {
        if snapshot.is_empty() {
            self.remove();
            return;
        }
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                tracing::trace!(bytes = json.len(), "queueing cart snapshot");
                let _queued = self.send(PersistCommand::Write(json));
            }
            Err(err) => (self.hook)(&FoodCartError::from(err)),
        }
    }

    /// Queues a delete of the persisted snapshot.
    pub(super) fn remove(&self) {
        let _queued = self.send(PersistCommand::Remove);
    }

    /// Waits until every command queued so far has been applied.
    pub(super) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.send(PersistCommand::Flush(done_tx)) {
            // The writer only drops the sender if it stopped; nothing to wait for then.
            let _applied = done_rx.await;
        }
    }

    /// Pushes a command, reporting a stopped writer to the hook.
    fn send(&self, command: PersistCommand) -> bool {
        if self.tx.send(command).is_ok() {
            return true;
        }
        (self.hook)(&FoodCartError::Storage(
            "cart persistence writer has stopped".into(),
        ));
        false
    }
}

/// Applies queued commands one at a time until the cart is dropped.
async fn run_writer<S: Storage>(
    storage: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
    hook: PersistErrorHook,
) {
    while let Some(command) = rx.recv().await {
        let outcome = match command {
            PersistCommand::Write(json) => storage.set(CART_KEY, json).await,
            PersistCommand::Remove => storage.remove(CART_KEY).await,
            PersistCommand::Flush(done) => {
                let _waiter_gone = done.send(());
                Ok(())
            }
        };
        if let Err(err) = outcome {
            hook(&err);
        }
    }
    tracing::debug!("cart persistence writer finished");
}

/// Default hook: log and carry on.
pub(super) fn log_persist_error(err: &FoodCartError) {
    tracing::warn!(error = %err, "failed to persist cart");
}
