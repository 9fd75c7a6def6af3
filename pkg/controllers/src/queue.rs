use crate::error::{Outcome, ReconcileError};
use async_trait::async_trait;
use pkg_state::client::StateStore;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pkg_constants::timing::REQUEUE_SHORT_SECS;

/// Domain logic for one kind. The queue guarantees at most one in-flight
/// reconcile per key; distinct keys reconcile in parallel.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Short kind name for logs.
    fn kind(&self) -> &'static str;

    /// Registry prefix of the kind this reconciler owns; watch events under
    /// it wake the queue, and resync relists it.
    fn prefix(&self) -> &'static str;

    async fn reconcile(&self, key: &str) -> Result<Outcome, ReconcileError>;
}

enum Msg {
    /// Delayed requeue firing.
    Wake(String),
    /// An in-flight reconcile returned.
    Finished {
        key: String,
        result: Result<Outcome, ReconcileError>,
    },
}

/// Runs one worker loop per registered reconciler, all fed from the
/// store's watch events plus a periodic resync.
pub struct Manager {
    store: StateStore,
    resync: Duration,
    reconcilers: Vec<Arc<dyn Reconciler>>,
}

impl Manager {
    pub fn new(store: StateStore, resync: Duration) -> Self {
        Self {
            store,
            resync,
            reconcilers: Vec::new(),
        }
    }

    pub fn register(&mut self, reconciler: Arc<dyn Reconciler>) {
        self.reconcilers.push(reconciler);
    }

    /// Run all workers until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut handles = Vec::new();
        for reconciler in self.reconcilers {
            handles.push(tokio::spawn(run_worker(
                self.store.clone(),
                reconciler,
                self.resync,
                shutdown.clone(),
            )));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Per-key bookkeeping: a key is at most once in `ready`, at most once in
/// flight, and a change arriving while it runs marks it `dirty` so it runs
/// again afterwards, so duplicate notifications merge instead of stacking.
struct KeyedQueue {
    queued: HashSet<String>,
    ready: VecDeque<String>,
    inflight: HashSet<String>,
    dirty: HashSet<String>,
}

impl KeyedQueue {
    fn new() -> Self {
        Self {
            queued: HashSet::new(),
            ready: VecDeque::new(),
            inflight: HashSet::new(),
            dirty: HashSet::new(),
        }
    }

    fn enqueue(&mut self, key: String) {
        if self.inflight.contains(&key) {
            self.dirty.insert(key);
        } else if self.queued.insert(key.clone()) {
            self.ready.push_back(key);
        }
    }

    fn pop(&mut self) -> Option<String> {
        let key = self.ready.pop_front()?;
        self.queued.remove(&key);
        self.inflight.insert(key.clone());
        Some(key)
    }

    fn finish(&mut self, key: &str) -> bool {
        self.inflight.remove(key);
        self.dirty.remove(key)
    }
}

async fn run_worker(
    store: StateStore,
    reconciler: Arc<dyn Reconciler>,
    resync: Duration,
    shutdown: CancellationToken,
) {
    let kind = reconciler.kind();
    let prefix = reconciler.prefix();
    info!("{} reconciler started (resync={}s)", kind, resync.as_secs());

    let (tx, mut rx) = mpsc::unbounded_channel::<Msg>();
    let mut events = store.events().subscribe();
    let mut queue = KeyedQueue::new();
    // First tick fires immediately and seeds the queue from the store.
    let mut tick = tokio::time::interval(resync);

    loop {
        // Dispatch everything ready before sleeping on the next signal.
        while let Some(key) = queue.pop() {
            let reconciler = reconciler.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = reconciler.reconcile(&key).await;
                let _ = tx.send(Msg::Finished { key, result });
            });
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("{} reconciler stopping", kind);
                break;
            }
            _ = tick.tick() => {
                match store.list_prefix(prefix).await {
                    Ok(entries) => {
                        for (key, _) in entries {
                            queue.enqueue(key);
                        }
                    }
                    Err(e) => warn!("{} resync list failed: {}", kind, e),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(ev) => {
                        if ev.key.starts_with(prefix) {
                            queue.enqueue(ev.key);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Resync relists the prefix, so lost events only
                        // delay work rather than dropping it.
                        warn!("{} watch lagged, {} events missed", kind, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    Msg::Wake(key) => queue.enqueue(key),
                    Msg::Finished { key, result } => {
                        let was_dirty = queue.finish(&key);
                        match result {
                            Ok(Outcome::Done) => {
                                if was_dirty {
                                    queue.enqueue(key);
                                }
                            }
                            Ok(Outcome::Requeue) => queue.enqueue(key),
                            Ok(Outcome::RequeueAfter(delay)) => {
                                if was_dirty {
                                    queue.enqueue(key);
                                } else {
                                    schedule_wake(&tx, key, delay);
                                }
                            }
                            Err(ReconcileError::Transient(e)) => {
                                warn!("{} reconcile of {} hit transient error, requeueing: {}", kind, key, e);
                                schedule_wake(&tx, key, Duration::from_secs(REQUEUE_SHORT_SECS));
                            }
                            Err(e) => {
                                // Unexpected escape: the object keeps its
                                // current phase, logged and ignored.
                                error!(
                                    "{} reconcile of {} failed ({}): {}",
                                    kind,
                                    key,
                                    e.kind(),
                                    e
                                );
                                if was_dirty {
                                    queue.enqueue(key);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn schedule_wake(tx: &mpsc::UnboundedSender<Msg>, key: String, delay: Duration) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(Msg::Wake(key));
    });
}
