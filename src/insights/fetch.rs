use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use super::client::ClusterSource;
use super::error::FetchError;
use super::model::{AnalysisContext, AnalysisResult};
use crate::cache::{SessionStore, TtlCache};

pub type FetchOutcome = Result<Arc<AnalysisResult>, FetchError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the cache read. The fresh result still replaces the cached one.
    pub force: bool,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

#[derive(Default)]
struct PendingSlot {
    outcome: Mutex<Option<FetchOutcome>>,
}

impl PendingSlot {
    fn resolve(&self, outcome: FetchOutcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }

    fn peek(&self) -> Option<FetchOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Ticket for one fetch. Every caller that joined the same request holds the
/// same slot and observes the same outcome.
#[derive(Clone)]
pub struct FetchHandle {
    context: AnalysisContext,
    slot: Arc<PendingSlot>,
}

impl FetchHandle {
    fn resolved(context: AnalysisContext, outcome: FetchOutcome) -> Self {
        let slot = PendingSlot::default();
        slot.resolve(outcome);
        Self {
            context,
            slot: Arc::new(slot),
        }
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.context
    }

    pub fn try_result(&self) -> Option<FetchOutcome> {
        self.slot.peek()
    }

    pub fn is_resolved(&self) -> bool {
        self.try_result().is_some()
    }

    pub fn shares_request_with(&self, other: &FetchHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

struct Completion {
    context: AnalysisContext,
    outcome: Result<AnalysisResult, FetchError>,
}

/// Read-through front for a [`ClusterSource`].
///
/// Owned by the UI thread. Requests run on worker threads and report back
/// over a channel that [`FetchCoordinator::poll`] drains, so the cache and
/// the in-flight table are only touched here.
pub struct FetchCoordinator<S: SessionStore> {
    source: Arc<dyn ClusterSource>,
    cache: TtlCache<AnalysisResult, S>,
    in_flight: HashMap<AnalysisContext, Arc<PendingSlot>>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
    requests_issued: u64,
}

impl<S: SessionStore> FetchCoordinator<S> {
    pub fn new(source: Arc<dyn ClusterSource>, cache: TtlCache<AnalysisResult, S>) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            source,
            cache,
            in_flight: HashMap::new(),
            completions_tx,
            completions_rx,
            requests_issued: 0,
        }
    }

    pub fn fetch_clusters(&mut self, context: &AnalysisContext, options: FetchOptions) -> FetchHandle {
        if !options.force
            && let Some(cached) = self.cache.get(context.as_str())
        {
            debug!(%context, "serving clusters from cache");
            return FetchHandle::resolved(context.clone(), Ok(cached));
        }

        if let Some(slot) = self.in_flight.get(context) {
            debug!(%context, force = options.force, "joining in-flight cluster request");
            return FetchHandle {
                context: context.clone(),
                slot: Arc::clone(slot),
            };
        }

        let source = Arc::clone(&self.source);
        let completions_tx = self.completions_tx.clone();
        let worker_context = context.clone();
        let spawned = thread::Builder::new()
            .name("cluster-fetch".to_owned())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.fetch(&worker_context)))
                    .unwrap_or_else(|_| {
                        Err(FetchError::Disconnected {
                            context: worker_context.to_string(),
                        })
                    });
                let _ = completions_tx.send(Completion {
                    context: worker_context,
                    outcome,
                });
            });

        if let Err(spawn_error) = spawned {
            error!(%context, %spawn_error, "could not start fetch worker");
            return FetchHandle::resolved(
                context.clone(),
                Err(FetchError::Network {
                    context: context.to_string(),
                    message: format!("could not start fetch worker: {spawn_error}"),
                }),
            );
        }

        self.requests_issued += 1;
        info!(%context, force = options.force, "fetching clusters");
        let slot = Arc::new(PendingSlot::default());
        self.in_flight.insert(context.clone(), Arc::clone(&slot));
        FetchHandle {
            context: context.clone(),
            slot,
        }
    }

    /// Applies finished requests. Returns how many completed.
    pub fn poll(&mut self) -> usize {
        let mut completed = 0;
        loop {
            match self.completions_rx.try_recv() {
                Ok(completion) => {
                    self.complete(completion);
                    completed += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        completed
    }

    /// Blocks the caller until `handle` resolves or `timeout` passes. A timed
    /// out wait leaves the request running.
    pub fn wait_for(&mut self, handle: &FetchHandle, timeout: Duration) -> FetchOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if let Some(outcome) = handle.try_result() {
                return outcome;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FetchError::Timeout {
                    context: handle.context.to_string(),
                    timeout,
                });
            }

            match self.completions_rx.recv_timeout(remaining) {
                Ok(completion) => self.complete(completion),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FetchError::Disconnected {
                        context: handle.context.to_string(),
                    });
                }
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        let Completion { context, outcome } = completion;
        let outcome = match outcome {
            Ok(result) => Ok(self.cache.set(context.as_str(), result)),
            Err(fetch_error) => {
                error!(%context, error = %fetch_error, "cluster fetch failed");
                Err(fetch_error)
            }
        };

        match self.in_flight.remove(&context) {
            Some(slot) => slot.resolve(outcome),
            None => debug!(%context, "completion without waiting callers"),
        }
    }

    pub fn cached(&mut self, context: &AnalysisContext) -> Option<Arc<AnalysisResult>> {
        self.cache.get(context.as_str())
    }

    pub fn invalidate(&mut self, context: &AnalysisContext) {
        self.cache.invalidate(context.as_str());
    }

    pub fn invalidate_all(&mut self) {
        self.cache.invalidate_all();
    }

    pub fn sweep_expired(&mut self) -> usize {
        self.cache.sweep_expired()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn is_in_flight(&self, context: &AnalysisContext) -> bool {
        self.in_flight.contains_key(context)
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }
}
