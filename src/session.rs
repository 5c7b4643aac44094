//! Session actor
//!
//! A session is one tokio task that owns a [`MoodEngine`] and serializes
//! every input through a single inbox. The task waits on three sources:
//!
//! - the inbox (signals, tracked events, reads, shutdown),
//! - the mood cadence, re-estimating every `tick_ms`,
//! - the idle debounce, restarted by every activity pulse and firing once
//!   after `idle_debounce_ms` of quiet.
//!
//! Each message runs to completion before the next one is taken, so the
//! engine never needs a lock. Reads are answered with owned snapshots.
//!
//! Dropping or shutting down the [`Session`] ends the task and releases both
//! timers; any [`SessionHandle`] still around then fails with
//! [`SessionError::Uninitialized`].

use crate::config::EngineConfig;
use crate::engine::{MoodEngine, Signal};
use crate::error::SessionError;
use crate::types::{
    BehaviorEvent, BehaviorImpact, Metrics, MoodState, SiteData, SiteEntry, SiteInfluence,
    TimelinePoint,
};
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

type Reader = Box<dyn FnOnce(&MoodEngine) + Send>;

enum Command {
    Signal(Signal),
    /// Pointer or key activity; restarts the idle debounce
    Activity,
    Track(BehaviorEvent),
    InjectMetrics(Metrics),
    Clear,
    Read(Reader),
    Shutdown,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    inbox: mpsc::Sender<Command>,
}

impl Default for SessionHandle {
    /// A handle bound to no session; every call fails with
    /// [`SessionError::Uninitialized`]
    fn default() -> Self {
        let (inbox, _) = mpsc::channel(1);
        Self { inbox }
    }
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.inbox
            .send(command)
            .await
            .map_err(|_| SessionError::Uninitialized)
    }

    /// Run `read` against the engine between two messages and return its result.
    ///
    /// A panic inside `read` is contained to this call: it fails with
    /// [`SessionError::ReadPanicked`] and the session keeps running.
    pub async fn read<T, F>(&self, read: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&MoodEngine) -> T + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.send(Command::Read(Box::new(move |engine| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| read(engine)));
            if outcome.is_err() {
                warn!("session reader panicked");
            }
            let _ = reply.send(outcome.map_err(|_| SessionError::ReadPanicked));
        })))
        .await?;
        response.await.map_err(|_| SessionError::Uninitialized)?
    }

    /// Whether the session behind this handle is still running
    pub fn is_active(&self) -> bool {
        !self.inbox.is_closed()
    }

    /// Forward a raw signal
    pub async fn signal(&self, signal: Signal) -> Result<(), SessionError> {
        self.send(Command::Signal(signal)).await
    }

    /// Scroll offset sample taken now; `None` when the position is unavailable
    pub async fn scroll(&self, offset: Option<f64>) -> Result<(), SessionError> {
        self.signal(Signal::Scroll {
            offset,
            at: Utc::now(),
        })
        .await
    }

    /// Visibility transition observed now
    pub async fn visibility(&self, hidden: bool) -> Result<(), SessionError> {
        self.signal(Signal::Visibility {
            hidden,
            at: Utc::now(),
        })
        .await
    }

    /// Pointer-move or key-press pulse
    pub async fn activity(&self) -> Result<(), SessionError> {
        self.send(Command::Activity).await
    }

    /// Record a discrete behavior event
    pub async fn track_event(&self, event: BehaviorEvent) -> Result<(), SessionError> {
        self.send(Command::Track(event)).await
    }

    /// Overwrite the metrics wholesale
    pub async fn inject_metrics(&self, metrics: Metrics) -> Result<(), SessionError> {
        self.send(Command::InjectMetrics(metrics)).await
    }

    /// Reset log, site table and metrics
    pub async fn clear_data(&self) -> Result<(), SessionError> {
        self.send(Command::Clear).await
    }

    /// Domains ranked by mood average, highest first
    pub async fn site_influence(&self) -> Result<Vec<SiteInfluence>, SessionError> {
        self.read(MoodEngine::site_influence).await
    }

    /// Export dump stamped now
    pub async fn export_data(&self) -> Result<String, SessionError> {
        self.read(|engine| engine.export_data(Utc::now())).await?
    }

    pub async fn current_mood(&self) -> Result<MoodState, SessionError> {
        self.read(|engine| engine.current_mood().clone()).await
    }

    pub async fn metrics(&self) -> Result<Metrics, SessionError> {
        self.read(|engine| *engine.metrics()).await
    }

    pub async fn events(&self) -> Result<Vec<BehaviorEvent>, SessionError> {
        self.read(MoodEngine::events).await
    }

    pub async fn site_data(&self) -> Result<Vec<SiteData>, SessionError> {
        self.read(MoodEngine::site_data).await
    }

    pub async fn site_entries(&self, limit: usize) -> Result<Vec<SiteEntry>, SessionError> {
        self.read(move |engine| engine.site_entries(limit)).await
    }

    pub async fn timeline(&self) -> Result<Vec<TimelinePoint>, SessionError> {
        self.read(MoodEngine::timeline).await
    }

    pub async fn behavior_impact(&self) -> Result<BehaviorImpact, SessionError> {
        self.read(MoodEngine::behavior_impact).await
    }
}

/// A running session; owns the actor task
pub struct Session {
    id: Uuid,
    handle: SessionHandle,
    task: Option<JoinHandle<MoodEngine>>,
}

impl Session {
    /// Start a session on the current tokio runtime
    pub fn start(config: EngineConfig) -> Result<Self, SessionError> {
        let engine = MoodEngine::new(config)?;
        Self::with_engine(engine)
    }

    /// Start a session around an existing engine
    pub fn with_engine(engine: MoodEngine) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::Runtime(e.to_string()))?;

        let id = Uuid::new_v4();
        let (inbox, commands) = mpsc::channel(engine.config().inbox_capacity);
        let span = info_span!("session", id = %id);
        let task = runtime.spawn(run(engine, commands).instrument(span));

        info!(session = %id, "session started");
        Ok(Self {
            id,
            handle: SessionHandle { inbox },
            task: Some(task),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A handle for feeding and reading this session
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the actor and wait for it to release its timers.
    ///
    /// Returns the final engine state, or `None` if the task did not finish
    /// cleanly.
    pub async fn shutdown(mut self) -> Option<MoodEngine> {
        let task = self.task.take()?;
        let _ = self.handle.send(Command::Shutdown).await;
        let engine = task.await.ok();
        info!(session = %self.id, "session stopped");
        engine
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(session = %self.id, "session dropped, actor aborted");
        }
    }
}

async fn run(mut engine: MoodEngine, mut commands: mpsc::Receiver<Command>) -> MoodEngine {
    let period = engine.config().tick_period();
    let debounce = engine.config().idle_debounce();

    let mut cadence = interval_at(Instant::now() + period, period);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let idle = sleep(debounce);
    tokio::pin!(idle);
    let mut idle_armed = false;

    loop {
        tokio::select! {
            // Timers first: a tick that is due reads the metrics as they are
            biased;

            () = &mut idle, if idle_armed => {
                idle_armed = false;
                engine.apply_signal(Signal::IdleWindow { at: Utc::now() });
            }
            _ = cadence.tick() => {
                engine.tick();
            }
            command = commands.recv() => match command {
                Some(Command::Signal(signal)) => engine.apply_signal(signal),
                Some(Command::Activity) => {
                    idle.as_mut().reset(Instant::now() + debounce);
                    idle_armed = true;
                }
                Some(Command::Track(event)) => engine.track_event(event, Utc::now()),
                Some(Command::InjectMetrics(metrics)) => engine.inject_metrics(metrics),
                Some(Command::Clear) => engine.clear_data(now_after(engine.metrics().timestamp)),
                Some(Command::Read(read)) => read(&engine),
                Some(Command::Shutdown) | None => break,
            },
        }
    }

    commands.close();
    engine
}

/// Wall-clock now, never earlier than `floor`
fn now_after(floor: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BehaviorEventType, MoodLabel};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn tab_switch(domain: &str) -> BehaviorEvent {
        BehaviorEvent::now(BehaviorEventType::TabSwitch, 1.0, domain)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mood_recomputed_on_cadence_only() {
        init_tracing();
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();

        handle
            .inject_metrics(Metrics {
                scroll_speed: 600.0,
                ..Metrics::zero(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap())
            })
            .await
            .unwrap();

        // Before the first tick the initial mood is still shown
        assert_eq!(handle.current_mood().await.unwrap(), MoodState::default());

        tokio::time::sleep(Duration::from_millis(2_050)).await;

        let mood = handle.current_mood().await.unwrap();
        assert_eq!(mood.score, 65.0);
        assert_eq!(mood.confidence, 0.7);
        assert_eq!(mood.label, MoodLabel::Focused);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tab_switches_through_facade() {
        init_tracing();
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();

        for _ in 0..6 {
            handle.track_event(tab_switch("example.com")).await.unwrap();
        }
        assert_eq!(handle.metrics().await.unwrap().tab_switches, 6);

        tokio::time::sleep(Duration::from_millis(2_050)).await;
        let mood = handle.current_mood().await.unwrap();
        assert_eq!(mood.score, 30.0);
        assert_eq!(mood.label, MoodLabel::Calm);

        let ticks = handle.read(|engine| engine.ticks()).await.unwrap();
        assert_eq!(ticks, 1);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_debounce_counts_quiet_windows() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();

        // Continuous activity never lets a window complete
        for _ in 0..10 {
            handle.activity().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(handle.metrics().await.unwrap().pause_duration, 0.0);

        // Quiet after the last pulse: exactly one window
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.metrics().await.unwrap().pause_duration, 100.0);

        // Each new pulse followed by quiet adds one more
        handle.activity().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(handle.metrics().await.unwrap().pause_duration, 200.0);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_data_keeps_mood_until_next_tick() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();

        for _ in 0..6 {
            handle.track_event(tab_switch("a.com")).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(2_050)).await;
        assert_eq!(handle.current_mood().await.unwrap().score, 30.0);

        handle.clear_data().await.unwrap();
        assert!(handle.metrics().await.unwrap().is_zero());
        assert!(handle.events().await.unwrap().is_empty());
        assert!(handle.site_data().await.unwrap().is_empty());
        assert_eq!(handle.current_mood().await.unwrap().score, 30.0);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(handle.current_mood().await.unwrap().score, 50.0);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_through_handle() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();

        handle
            .track_event(BehaviorEvent::now(BehaviorEventType::Reading, 70.0, "docs.rs"))
            .await
            .unwrap();

        for _ in 0..3 {
            handle.track_event(tab_switch("a.com")).await.unwrap();
            handle.activity().await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
        }

        let json = handle.export_data().await.unwrap();
        let payload = crate::encoder::parse_export(&json).unwrap();
        assert_eq!(payload.events.len(), 4);
        assert_eq!(payload.events, handle.events().await.unwrap());
        assert_eq!(payload.metrics, handle.metrics().await.unwrap());
        assert_eq!(payload.site_data[0].0, "docs.rs");
        assert_eq!(payload.current_mood, MoodState::default());

        let influence = handle.site_influence().await.unwrap();
        assert_eq!(influence, handle.site_influence().await.unwrap());

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_reader_leaves_session_running() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();

        let result = handle
            .read(|engine| {
                if engine.ticks() == 0 {
                    panic!("reader failed");
                }
                engine.ticks()
            })
            .await;
        assert!(matches!(result, Err(SessionError::ReadPanicked)));

        assert!(handle.is_active());
        handle.track_event(tab_switch("a.com")).await.unwrap();
        assert_eq!(handle.events().await.unwrap().len(), 1);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_fails_after_shutdown() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();
        assert!(handle.is_active());

        let engine = session.shutdown().await;
        assert!(engine.is_some());
        assert!(!handle.is_active());

        assert!(matches!(
            handle.current_mood().await,
            Err(SessionError::Uninitialized)
        ));
        assert!(matches!(
            handle.track_event(tab_switch("a.com")).await,
            Err(SessionError::Uninitialized)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_session_tears_down_actor() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let handle = session.handle();
        drop(session);

        // Let the aborted task unwind
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            handle.export_data().await,
            Err(SessionError::Uninitialized)
        ));
    }

    #[tokio::test]
    async fn test_unbound_handle_is_uninitialized() {
        let handle = SessionHandle::default();
        assert!(!handle.is_active());
        assert!(matches!(
            handle.site_influence().await,
            Err(SessionError::Uninitialized)
        ));
        assert!(matches!(
            handle.clear_data().await,
            Err(SessionError::Uninitialized)
        ));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        assert!(matches!(
            Session::start(EngineConfig::default()),
            Err(SessionError::Runtime(_))
        ));
    }
}
