use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    election::{format_remaining, ElectionStatus, Phase},
    errors::VoteError,
};

/// Read side of the contract the poller depends on
pub trait ElectionSource: Send + Sync + 'static {
    fn election_status(&self) -> BoxFuture<'static, Result<ElectionStatus, VoteError>>;
}

/// Wall clock in unix seconds
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// What subscribers see after every refresh
#[derive(Clone, Serialize, Debug, PartialEq, Default)]
pub struct ElectionView {
    /// Last successfully read contract state
    pub election: Option<ElectionStatus>,
    pub phase: Phase,
    pub remaining: Option<Duration>,
    pub remaining_text: Option<String>,
    /// Clock reading the view was derived with
    pub computed_at: u64,
    /// Request that produced the election state
    pub sequence: u64,
    /// Message of the last read failure, cleared by the next successful read
    pub error: Option<String>,
}

impl ElectionView {
    pub fn derive(election: ElectionStatus, now: u64, sequence: u64) -> Self {
        let remaining = election.remaining(now);
        ElectionView {
            election: Some(election),
            phase: election.phase(now),
            remaining,
            remaining_text: remaining.map(format_remaining),
            computed_at: now,
            sequence,
            error: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Discard {
    /// A later request was applied first
    Superseded,
    /// The poller was stopped while the request was in flight
    Stopped,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Applied(ElectionView),
    /// The read failed; the published view is the prior one with `error` set
    Failed(ElectionView, VoteError),
    Discarded(Discard),
}

impl RefreshOutcome {
    pub fn view(&self) -> Option<&ElectionView> {
        match self {
            RefreshOutcome::Applied(view) | RefreshOutcome::Failed(view, _) => Some(view),
            RefreshOutcome::Discarded(_) => None,
        }
    }
}

struct PollerState {
    next_sequence: u64,
    last_applied: u64,
    generation: u64,
    in_flight: usize,
    max_in_flight: usize,
    timer: Option<JoinHandle<()>>,
}

struct PollerInner {
    source: Arc<dyn ElectionSource>,
    clock: Arc<dyn Clock>,
    state: Mutex<PollerState>,
    view: watch::Sender<ElectionView>,
}

impl PollerInner {
    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn complete(
        &self,
        sequence: u64,
        generation: u64,
        result: Result<ElectionStatus, VoteError>,
    ) -> RefreshOutcome {
        let now = self.clock.now();
        let mut state = self.lock();
        if generation != state.generation {
            log::debug!("Discarding election status #{sequence}: poller stopped");
            return RefreshOutcome::Discarded(Discard::Stopped);
        }
        if sequence < state.last_applied {
            log::debug!(
                "Discarding election status #{sequence}: #{} already applied",
                state.last_applied
            );
            return RefreshOutcome::Discarded(Discard::Superseded);
        }
        state.last_applied = sequence;
        match result {
            Ok(election) => {
                let view = ElectionView::derive(election, now, sequence);
                self.view.send_replace(view.clone());
                RefreshOutcome::Applied(view)
            }
            Err(e) => {
                log::warn!("Failed to read election status: {e}");
                let mut view = self.view.borrow().clone();
                view.error = Some(e.to_string());
                self.view.send_replace(view.clone());
                RefreshOutcome::Failed(view, e)
            }
        }
    }
}

/// Counts a request as outstanding until its future completes or is dropped
struct InFlight(Arc<PollerInner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

/// Keeps a derived view of the election up to date by polling an
/// [`ElectionSource`].
///
/// Every request is numbered when issued. A response is applied only if no
/// later request was applied before it, and only if `stop` was not called
/// while it was in flight. Read failures never escape: the previous view is
/// republished with the error attached and the next tick retries.
#[derive(Clone)]
pub struct ElectionPoller {
    inner: Arc<PollerInner>,
}

impl ElectionPoller {
    pub fn new(source: Arc<dyn ElectionSource>) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<dyn ElectionSource>, clock: Arc<dyn Clock>) -> Self {
        let (view, _) = watch::channel(ElectionView::default());
        ElectionPoller {
            inner: Arc::new(PollerInner {
                source,
                clock,
                state: Mutex::new(PollerState {
                    next_sequence: 0,
                    last_applied: 0,
                    generation: 0,
                    in_flight: 0,
                    max_in_flight: 1,
                    timer: None,
                }),
                view,
            }),
        }
    }

    /// Ticks skip their fetch while this many requests are outstanding
    pub fn set_max_in_flight(&self, max_in_flight: usize) {
        self.inner.lock().max_in_flight = max_in_flight.max(1);
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock()
            .timer
            .as_ref()
            .map_or(false, |t| !t.is_finished())
    }

    pub fn current(&self) -> ElectionView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ElectionView> {
        self.inner.view.subscribe()
    }

    /// Issues one read. The request is numbered and sent when this is
    /// called, before the returned future is first polled.
    pub fn refresh(&self) -> impl Future<Output = RefreshOutcome> + Send + 'static {
        let mut state = self.inner.lock();
        let issued = self.issue(&mut state);
        drop(state);
        self.await_outcome(issued)
    }

    /// Numbers a request and asks the source for it, under the state lock
    /// so that no request can slip in after `stop` returns.
    /// `ElectionSource::election_status` must not call back into the poller.
    fn issue(&self, state: &mut PollerState) -> Issued {
        state.next_sequence += 1;
        state.in_flight += 1;
        Issued {
            sequence: state.next_sequence,
            generation: state.generation,
            request: self.inner.source.election_status(),
        }
    }

    fn await_outcome(
        &self,
        issued: Issued,
    ) -> impl Future<Output = RefreshOutcome> + Send + 'static {
        let guard = InFlight(self.inner.clone());
        let Issued {
            sequence,
            generation,
            request,
        } = issued;
        async move {
            let result = request.await;
            let outcome = guard.0.complete(sequence, generation, result);
            drop(guard);
            outcome
        }
    }

    /// Refresh on behalf of the timer started in `timer_generation`
    fn tick(&self, timer_generation: u64) -> Tick {
        let mut state = self.inner.lock();
        if state.generation != timer_generation {
            return Tick::Stopped;
        }
        if state.in_flight >= state.max_in_flight {
            return Tick::Busy(state.in_flight);
        }
        let issued = self.issue(&mut state);
        drop(state);
        Tick::Issued(Box::pin(self.await_outcome(issued)))
    }

    /// Refreshes now and then every `period` until stopped. Does nothing
    /// but return a handle if the timer is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, period: Duration) -> PollerHandle {
        let mut state = self.inner.lock();
        let running = state.timer.as_ref().map_or(false, |t| !t.is_finished());
        if !running {
            log::info!("Polling election status every {period:?}");
            let inner = Arc::downgrade(&self.inner);
            let generation = state.generation;
            state.timer = Some(tokio::spawn(run_timer(inner, period, generation)));
        }
        PollerHandle {
            poller: self.clone(),
        }
    }

    /// Cancels the timer. Responses to requests issued before this call are
    /// discarded when they arrive, and no tick issues a request after it.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            log::info!("Stopped polling election status");
            timer.abort();
        }
    }
}

struct Issued {
    sequence: u64,
    generation: u64,
    request: BoxFuture<'static, Result<ElectionStatus, VoteError>>,
}

enum Tick {
    Issued(BoxFuture<'static, RefreshOutcome>),
    Busy(usize),
    Stopped,
}

async fn run_timer(inner: Weak<PollerInner>, period: Duration, generation: u64) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(strong) = inner.upgrade() else {
            break;
        };
        let poller = ElectionPoller { inner: strong };
        match poller.tick(generation) {
            Tick::Issued(refresh) => {
                tokio::spawn(refresh);
            }
            Tick::Busy(in_flight) => {
                log::debug!("Skipping tick, {in_flight} request(s) outstanding");
            }
            Tick::Stopped => break,
        }
    }
}

/// Returned by [`ElectionPoller::start`]
pub struct PollerHandle {
    poller: ElectionPoller,
}

impl PollerHandle {
    pub fn poller(&self) -> &ElectionPoller {
        &self.poller
    }

    pub fn stop(self) {
        self.poller.stop();
    }
}
