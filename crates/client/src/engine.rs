//! Reconnecting push-channel client.
//!
//! One [`ProgressClient`] owns at most one live subscription. Every attempt
//! gets a generation number and a [`CancellationToken`]; starting a new
//! attempt cancels the previous one, and callbacks from a superseded
//! generation are ignored. Retry timers and the staleness watchdog are
//! cancellable the same way.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use jobwatch_core::progress::ProgressNode;
use jobwatch_core::summary::{toast_summaries, Summary};
use jobwatch_core::tree::ProgressTree;
use jobwatch_core::types::{JobId, Timestamp};
use jobwatch_events::{PushEventKind, SseFrame};

use crate::clock::{elapsed_between, Clock, SystemClock};
use crate::config::ClientConfig;
use crate::state::{ConnectionState, Visibility};
use crate::transport::{EventSource, FrameStream, OpenError};

pub type AuthExpiredHandler = Arc<dyn Fn() + Send + Sync>;
pub type UpdateHandler = Arc<dyn Fn(&ProgressNode) + Send + Sync>;

/// Client for the job-progress push channel.
///
/// Methods that start work (`connect`, `force_reconnect`, the visibility
/// hook) spawn Tokio tasks and must be called inside a runtime. Dropping
/// the client disconnects it.
pub struct ProgressClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn EventSource>,
    clock: Arc<dyn Clock>,
    session: Mutex<Session>,
    tree: RwLock<ProgressTree>,
    state_tx: watch::Sender<ConnectionState>,
    on_auth_expired: RwLock<Option<AuthExpiredHandler>>,
    on_update: RwLock<Option<UpdateHandler>>,
}

#[derive(Default)]
struct Session {
    state: ConnectionState,
    generation: u64,
    attempt: Option<CancellationToken>,
    retry: Option<CancellationToken>,
    watchdog: Option<CancellationToken>,
    retry_count: u32,
    last_heartbeat_at: Option<Timestamp>,
}

/// Why a stream pump stopped.
enum PumpEnd {
    Cancelled,
    Closed,
    AuthExpired,
}

fn read<T: ?Sized>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl ProgressClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn EventSource>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ClientConfig,
        transport: Arc<dyn EventSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                clock,
                session: Mutex::new(Session::default()),
                tree: RwLock::new(ProgressTree::new()),
                state_tx,
                on_auth_expired: RwLock::new(None),
                on_update: RwLock::new(None),
            }),
        }
    }

    /// Open the subscription. A no-op while an attempt is in flight;
    /// otherwise any previous connection and pending retry are cancelled.
    pub fn connect(&self) {
        let mut session = self.inner.lock_session();
        if session.state == ConnectionState::Connecting {
            tracing::debug!("Connect requested while connecting, ignoring");
            return;
        }
        self.inner.start_attempt_locked(&mut session);
    }

    /// Abort the current connection and reconnect now, with a fresh retry
    /// budget. Idempotent: ignored while an attempt is in flight.
    pub fn force_reconnect(&self) {
        self.inner.force_reconnect("requested");
    }

    /// Stop everything: in-flight attempt, retry timer and watchdog. No
    /// automatic reconnects happen until the next [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Reconnect when the connection has been silent longer than the
    /// staleness threshold. Returns whether a reconnect was started.
    ///
    /// The watchdog calls this periodically; hosts may call it directly.
    pub fn check_staleness(&self) -> bool {
        self.inner.check_staleness()
    }

    /// Wake hook. Becoming visible runs the staleness check immediately,
    /// since timers may not have fired while the host was asleep.
    pub fn on_visibility_change(&self, visibility: Visibility) {
        match visibility {
            Visibility::Visible => {
                if self.inner.check_staleness() {
                    tracing::info!("Stale connection detected on wake");
                }
            }
            Visibility::Hidden => tracing::debug!("Host hidden"),
        }
    }

    /// Replace the handler invoked when the server rejects the session.
    pub fn set_auth_expired_handler(&self, handler: impl Fn() + Send + Sync + 'static) {
        *write(&self.inner.on_auth_expired) = Some(Arc::new(handler));
    }

    /// Replace the handler invoked after each merged update. It receives the
    /// materialised node, children included.
    pub fn set_update_handler(&self, handler: impl Fn(&ProgressNode) + Send + Sync + 'static) {
        *write(&self.inner.on_update) = Some(Arc::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_session().state
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn last_heartbeat_at(&self) -> Option<Timestamp> {
        self.inner.lock_session().last_heartbeat_at
    }

    /// Retries spent since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.inner.lock_session().retry_count
    }

    /// Run `f` against the current progress tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&ProgressTree) -> R) -> R {
        f(&read(&self.inner.tree))
    }

    /// Summaries of the top-level jobs that should be shown as toasts.
    pub fn summaries(&self) -> Vec<(JobId, Summary)> {
        toast_summaries(&read(&self.inner.tree))
    }

    /// Drop a job and its descendants from the local tree.
    pub fn clear_job(&self, id: &str) -> usize {
        write(&self.inner.tree).remove(id)
    }
}

impl Drop for ProgressClient {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl Inner {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, session: &mut Session, state: ConnectionState) {
        if session.state != state {
            tracing::debug!(from = %session.state, to = %state, "Connection state changed");
        }
        session.state = state;
        self.state_tx.send_replace(state);
    }

    // ---- lifecycle ----

    fn start_attempt_locked(self: &Arc<Self>, session: &mut Session) {
        if let Some(token) = session.attempt.take() {
            token.cancel();
        }
        if let Some(token) = session.retry.take() {
            token.cancel();
        }

        session.generation += 1;
        let generation = session.generation;
        let token = CancellationToken::new();
        session.attempt = Some(token.clone());
        self.set_state(session, ConnectionState::Connecting);
        self.ensure_watchdog_locked(session);

        tracing::info!(generation, retry = session.retry_count, "Opening progress stream");
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.run_attempt(generation, token).await });
    }

    fn force_reconnect(self: &Arc<Self>, reason: &str) -> bool {
        let mut session = self.lock_session();
        if session.state == ConnectionState::Connecting {
            return false;
        }
        tracing::info!(reason, "Forcing reconnect");
        session.retry_count = 0;
        self.start_attempt_locked(&mut session);
        true
    }

    fn disconnect(&self) {
        let mut session = self.lock_session();
        session.generation += 1;
        for token in [
            session.attempt.take(),
            session.retry.take(),
            session.watchdog.take(),
        ]
        .into_iter()
        .flatten()
        {
            token.cancel();
        }
        session.retry_count = 0;
        self.set_state(&mut session, ConnectionState::Disconnected);
        tracing::info!("Progress stream disconnected");
    }

    fn check_staleness(self: &Arc<Self>) -> bool {
        let silence = {
            let session = self.lock_session();
            if session.state != ConnectionState::Connected {
                return false;
            }
            match session.last_heartbeat_at {
                Some(at) => elapsed_between(at, self.clock.now()),
                None => return false,
            }
        };

        if silence <= self.config.staleness_threshold() {
            return false;
        }

        tracing::warn!(
            silence_secs = silence.as_secs(),
            threshold_secs = self.config.staleness_threshold().as_secs(),
            "Progress stream is stale"
        );
        self.force_reconnect("stale")
    }

    // ---- attempt ----

    async fn run_attempt(self: Arc<Self>, generation: u64, token: CancellationToken) {
        let deadline = self.config.open_timeout;
        let opened = tokio::select! {
            biased;
            () = token.cancelled() => return,
            opened = tokio::time::timeout(deadline, self.transport.open(&self.config.token)) => {
                opened
            }
        };

        let stream = match opened {
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_secs = deadline.as_secs(),
                    "Progress stream did not open in time"
                );
                self.on_failure(generation, ConnectionState::Error);
                return;
            }
            Ok(Ok(stream)) => stream,
            Ok(Err(OpenError::Unauthorized)) => {
                tracing::warn!("Progress stream rejected: unauthorized");
                self.on_auth_failure(generation);
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to open progress stream");
                self.on_failure(generation, ConnectionState::Error);
                return;
            }
        };

        if !self.on_open(generation) {
            return;
        }

        if self.config.hydrate_on_connect {
            self.hydrate(&token).await;
        }

        match self.pump(stream, generation, &token).await {
            PumpEnd::Cancelled => {}
            PumpEnd::AuthExpired => self.on_auth_failure(generation),
            PumpEnd::Closed => {
                tracing::info!("Progress stream closed by server");
                self.on_failure(generation, ConnectionState::Disconnected);
            }
        }
    }

    fn on_open(&self, generation: u64) -> bool {
        let mut session = self.lock_session();
        if session.generation != generation {
            return false;
        }
        session.retry_count = 0;
        session.last_heartbeat_at = Some(self.clock.now());
        self.set_state(&mut session, ConnectionState::Connected);
        tracing::info!(generation, "Progress stream connected");
        true
    }

    /// Terminal: no retry is scheduled.
    fn on_auth_failure(&self, generation: u64) {
        {
            let mut session = self.lock_session();
            if session.generation != generation {
                return;
            }
            session.attempt = None;
            if let Some(token) = session.retry.take() {
                token.cancel();
            }
            self.set_state(&mut session, ConnectionState::Error);
        }

        let handler = read(&self.on_auth_expired).clone();
        match handler {
            Some(handler) => handler(),
            None => tracing::warn!("Session expired and no handler is set"),
        }
    }

    fn on_failure(self: &Arc<Self>, generation: u64, state: ConnectionState) {
        let mut session = self.lock_session();
        if session.generation != generation {
            return;
        }
        session.attempt = None;
        self.set_state(&mut session, state);
        self.schedule_retry_locked(&mut session);
    }

    fn schedule_retry_locked(self: &Arc<Self>, session: &mut Session) {
        let max = self.config.max_retries;
        if max != 0 && session.retry_count >= max {
            tracing::error!(retries = session.retry_count, "Retry limit reached, giving up");
            return;
        }
        session.retry_count += 1;

        let token = CancellationToken::new();
        session.retry = Some(token.clone());
        let generation = session.generation;
        let delay = self.config.retry_interval;
        tracing::info!(
            retry = session.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => inner.fire_retry(generation),
            }
        });
    }

    fn fire_retry(self: &Arc<Self>, generation: u64) {
        let mut session = self.lock_session();
        if session.generation != generation {
            return;
        }
        session.retry = None;
        self.start_attempt_locked(&mut session);
    }

    // ---- inbound ----

    async fn hydrate(&self, token: &CancellationToken) {
        let fetched = tokio::select! {
            () = token.cancelled() => return,
            fetched = self.transport.fetch_active(&self.config.token) => fetched,
        };

        match fetched {
            Ok(jobs) => {
                let mut tree = write(&self.tree);
                let mut merged = 0;
                for node in jobs.into_iter().filter_map(|job| job.progress) {
                    match tree.apply_update(node) {
                        Ok(_) => merged += 1,
                        Err(e) => tracing::warn!(error = %e, "Skipping active job"),
                    }
                }
                tracing::debug!(merged, "Hydrated progress tree from active jobs");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load active jobs"),
        }
    }

    async fn pump(&self, mut stream: FrameStream, generation: u64, token: &CancellationToken) -> PumpEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return PumpEnd::Cancelled,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    if self.dispatch(&frame, generation).is_break() {
                        return PumpEnd::AuthExpired;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Progress stream failed");
                    return PumpEnd::Closed;
                }
                None => return PumpEnd::Closed,
            }
        }
    }

    /// Apply one frame. Breaks when the frame ends the session.
    fn dispatch(&self, frame: &SseFrame, generation: u64) -> ControlFlow<()> {
        match frame.kind() {
            Some(PushEventKind::Update) => {
                match frame.parse_data::<ProgressNode>() {
                    Ok(node) => self.apply_update(node),
                    Err(e) => tracing::warn!(error = %e, "Malformed update event"),
                }
                ControlFlow::Continue(())
            }
            Some(PushEventKind::KeepAlive) => {
                let mut session = self.lock_session();
                if session.generation == generation {
                    session.last_heartbeat_at = Some(self.clock.now());
                }
                ControlFlow::Continue(())
            }
            Some(PushEventKind::AuthExpired) => {
                tracing::warn!("Server reported session expiry");
                ControlFlow::Break(())
            }
            Some(PushEventKind::Complete) => {
                tracing::info!("Server completed the progress stream");
                ControlFlow::Continue(())
            }
            Some(PushEventKind::Error) => {
                tracing::warn!(data = %frame.data, "Server reported an error");
                ControlFlow::Continue(())
            }
            None => {
                tracing::debug!(event = ?frame.event, "Ignoring unrecognised event");
                ControlFlow::Continue(())
            }
        }
    }

    fn apply_update(&self, node: ProgressNode) {
        let id = node.id.clone();
        let view = {
            let mut tree = write(&self.tree);
            match tree.apply_update(node) {
                Ok(outcome) => {
                    tracing::debug!(job_id = %id, outcome = ?outcome, "Merged progress update");
                    tree.materialize(&id)
                }
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "Rejected progress update");
                    None
                }
            }
        };

        let Some(view) = view else { return };
        let handler = read(&self.on_update).clone();
        if let Some(handler) = handler {
            handler(&view);
        }
    }

    // ---- watchdog ----

    fn ensure_watchdog_locked(self: &Arc<Self>, session: &mut Session) {
        if session.watchdog.is_some() {
            return;
        }
        let token = CancellationToken::new();
        session.watchdog = Some(token.clone());

        let weak: Weak<Inner> = Arc::downgrade(self);
        let period = self.config.watchdog_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.check_staleness();
                    }
                }
            }
            tracing::debug!("Staleness watchdog stopped");
        });
    }
}
