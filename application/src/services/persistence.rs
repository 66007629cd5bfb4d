//! Deferred, debounced persistence.
//!
//! [`DeferredPersistence`] owns a background task that coalesces saves:
//! [`schedule`](DeferredPersistence::schedule) only queues the latest
//! snapshot, and the worker writes it once the debounce period passes
//! without a newer one. [`flush`](DeferredPersistence::flush) writes any
//! pending snapshot immediately and waits for it, which is how teardown
//! guarantees the final state reaches the store.

use crate::ports::state_store::StateStore;
use cud_domain::{PartialSessionState, PersistedSnapshot};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

enum PersistCommand {
    Save(PersistedSnapshot),
    Flush(oneshot::Sender<()>),
    Clear(oneshot::Sender<()>),
}

pub struct DeferredPersistence {
    store: Arc<dyn StateStore>,
    tx: mpsc::UnboundedSender<PersistCommand>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredPersistence {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn StateStore>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(store.clone(), debounce, rx, cancel.clone()));

        Self {
            store,
            tx,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue `snapshot` for writing. Never blocks and never fails; a newer
    /// snapshot scheduled within the debounce period replaces this one.
    pub fn schedule(&self, snapshot: PersistedSnapshot) {
        if self.tx.send(PersistCommand::Save(snapshot)).is_err() {
            warn!("Persistence worker has stopped; state change not saved");
        }
    }

    /// Write any pending snapshot now and wait until it is stored.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Drop any pending snapshot and remove stored records.
    pub async fn clear(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(PersistCommand::Clear(ack)).is_ok() {
            let _ = done.await;
        } else {
            self.store.clear();
        }
    }

    /// Read stored state off the async runtime's worker threads.
    pub async fn load(&self) -> PartialSessionState {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(state) => state,
            Err(e) => {
                warn!("State load task failed: {}", e);
                PartialSessionState::default()
            }
        }
    }

    /// Flush, then stop the worker and wait for it to exit.
    pub async fn shutdown(&self) {
        self.flush().await;
        self.cancel.cancel();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!("Persistence worker ended abnormally: {}", e);
        }
    }
}

impl Drop for DeferredPersistence {
    fn drop(&mut self) {
        // The worker writes whatever is still pending before it exits
        self.cancel.cancel();
    }
}

async fn run_worker(
    store: Arc<dyn StateStore>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
    cancel: CancellationToken,
) {
    let mut pending: Option<PersistedSnapshot> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                write(&store, pending.take()).await;
                break;
            }
            command = rx.recv() => match command {
                Some(PersistCommand::Save(snapshot)) => {
                    trace!("Save scheduled ({} messages)", snapshot.messages.len());
                    pending = Some(snapshot);
                    deadline = Instant::now() + debounce;
                }
                Some(PersistCommand::Flush(ack)) => {
                    write(&store, pending.take()).await;
                    let _ = ack.send(());
                }
                Some(PersistCommand::Clear(ack)) => {
                    pending = None;
                    let store = store.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || store.clear()).await {
                        warn!("State clear task failed: {}", e);
                    }
                    let _ = ack.send(());
                }
                None => {
                    write(&store, pending.take()).await;
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                write(&store, pending.take()).await;
            }
        }
    }
    debug!("Persistence worker stopped");
}

async fn write(store: &Arc<dyn StateStore>, snapshot: Option<PersistedSnapshot>) {
    let Some(snapshot) = snapshot else {
        return;
    };
    let store = store.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
        warn!("State save task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::state_store::MemoryStateStore;
    use cud_domain::{ModelId, SessionState, TranscriptMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts writes
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStateStore,
        saves: AtomicUsize,
    }

    impl StateStore for CountingStore {
        fn save(&self, snapshot: &PersistedSnapshot) {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(snapshot);
        }

        fn load(&self) -> PartialSessionState {
            self.inner.load()
        }

        fn clear(&self) {
            self.inner.clear();
        }
    }

    fn snapshot_with(text: &str) -> PersistedSnapshot {
        let mut state = SessionState::new(ModelId::default());
        state.transcript.push(TranscriptMessage::user_text(text));
        PersistedSnapshot::capture(&state, 100)
    }

    #[tokio::test]
    async fn test_flush_coalesces_pending_saves() {
        let store = Arc::new(CountingStore::default());
        let persistence = DeferredPersistence::spawn(store.clone(), Duration::from_secs(60));

        persistence.schedule(snapshot_with("one"));
        persistence.schedule(snapshot_with("two"));
        persistence.schedule(snapshot_with("three"));
        persistence.flush().await;

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        let saved = store.inner.saved().unwrap();
        assert_eq!(saved.messages[0].content, "three");
    }

    #[tokio::test]
    async fn test_debounce_elapses_without_flush() {
        let store = Arc::new(CountingStore::default());
        let persistence = DeferredPersistence::spawn(store.clone(), Duration::from_millis(10));

        persistence.schedule(snapshot_with("later"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        persistence.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_with_nothing_pending_does_not_write() {
        let store = Arc::new(CountingStore::default());
        let persistence = DeferredPersistence::spawn(store.clone(), Duration::from_millis(10));
        persistence.flush().await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_writes_pending_state() {
        let store = Arc::new(CountingStore::default());
        let persistence = DeferredPersistence::spawn(store.clone(), Duration::from_secs(60));
        persistence.schedule(snapshot_with("final"));
        persistence.shutdown().await;

        assert_eq!(store.inner.saved().unwrap().messages[0].content, "final");
        // Scheduling after shutdown is harmless
        persistence.schedule(snapshot_with("ignored"));
    }

    #[tokio::test]
    async fn test_clear_discards_pending_and_stored() {
        let store = Arc::new(CountingStore::default());
        let persistence = DeferredPersistence::spawn(store.clone(), Duration::from_secs(60));
        persistence.schedule(snapshot_with("stored"));
        persistence.flush().await;
        persistence.schedule(snapshot_with("pending"));
        persistence.clear().await;
        persistence.flush().await;

        assert!(persistence.load().await.is_empty());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }
}
