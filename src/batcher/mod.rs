//! Heartbeat batcher
//!
//! Owns the FIFO heartbeat queue and the last-tracked record. Accepted
//! events (re)arm a trailing-edge debounce; when the quiet period elapses the
//! whole queue is drained into one dispatch, first event as primary and the
//! rest as extras.

use crate::dispatch::{CommandRunner, Dispatcher};
use crate::filter::{should_track, LastTracked};
use crate::{resolve_project_name, Config, Heartbeat, RawActivity};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Batches accepted activity events and dispatches them after a quiet period.
///
/// Cloneable handle; all clones share the same queue and state.
#[derive(Clone)]
pub struct HeartbeatBatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    dispatcher: Dispatcher,
    queue: Mutex<VecDeque<Heartbeat>>,
    last: Mutex<LastTracked>,
    pending_drain: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatBatcher {
    pub fn new(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        let dispatcher = Dispatcher::new(config.clone(), runner);
        Self {
            inner: Arc::new(Inner {
                config,
                dispatcher,
                queue: Mutex::new(VecDeque::new()),
                last: Mutex::new(LastTracked::default()),
                pending_drain: Mutex::new(None),
            }),
        }
    }

    /// Gate a raw event through the activity filter and, if accepted, queue
    /// it and (re)arm the debounce.
    ///
    /// Cheap and non-blocking: the external-process call never happens here.
    pub async fn record(&self, raw: RawActivity, timestamp: f64) {
        if raw.entity.is_empty() {
            return;
        }

        // filter check, enqueue and last-tracked update form one transaction
        let mut last = self.inner.last.lock().await;
        if !should_track(
            &last,
            self.inner.config.frequency_minutes,
            &raw.entity,
            timestamp,
            raw.is_write,
        ) {
            return;
        }

        let project = raw
            .project_file
            .as_deref()
            .and_then(|path| resolve_project_name(path, &self.inner.config.project_file_suffix));

        let heartbeat = Heartbeat {
            entity: raw.entity.clone(),
            timestamp,
            is_write: raw.is_write,
            cursor_position: raw.cursor_position,
            project,
        };

        self.inner.queue.lock().await.push_back(heartbeat);
        last.update(&raw.entity, timestamp);
        drop(last);

        self.rearm().await;
    }

    /// Cancel any pending drain and schedule a fresh one after the
    /// quiescence window, so a burst collapses into a single drain timed
    /// from its last event.
    async fn rearm(&self) {
        let inner = Arc::clone(&self.inner);
        let mut pending = self.inner.pending_drain.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.config.quiescence).await;
            // detach the drain itself: a rearm landing now may cancel the
            // timer, but never an in-flight dispatch
            tokio::spawn(async move {
                drain(&inner).await;
            });
        }));
    }

    /// Drain immediately, cancelling any pending delayed drain.
    ///
    /// Used on shutdown so the tail of the queue is not lost.
    pub async fn flush(&self) {
        let mut pending = self.inner.pending_drain.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        drop(pending);
        drain(&self.inner).await;
    }
}

/// Remove everything currently queued and dispatch it as one batch.
///
/// An empty drain returns immediately; this makes racing or duplicate timer
/// firings harmless. Dispatch failures are logged inside the dispatcher and
/// never reach the enqueue path.
async fn drain(inner: &Inner) {
    let batch: Vec<Heartbeat> = {
        let mut queue = inner.queue.lock().await;
        queue.drain(..).collect()
    };

    let mut events = batch.into_iter();
    let Some(primary) = events.next() else {
        return;
    };
    let extras: Vec<Heartbeat> = events.collect();

    debug!(
        "Draining {} heartbeat(s), primary: {}",
        extras.len() + 1,
        primary.entity
    );
    inner.dispatcher.send(primary, extras).await;
}
