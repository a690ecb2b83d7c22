//! Heartbeat driver: the timer task that keeps the gateway connection alive.
//!
//! The driver moves through three phases:
//!
//! ```text
//! Idle --start--> Running --kill--> Stopped
//!                  |   ^
//!                  +---+ restart / start again
//! ```
//!
//! While running it beats, then waits up to one interval for a signal.
//! `restart` ends the wait early and beats immediately; `kill` ends the
//! task. Signals live under their own small mutex, separate from the write
//! lock, and are delivered through a [`Notify`] so a waiting task wakes at
//! once instead of at the end of the interval.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::writer::GatewayWriter;

/// Something that can send one heartbeat
#[async_trait]
pub trait Beat: Send + Sync + 'static {
    /// Send a heartbeat now
    async fn beat(&self) -> Result<(), SessionError>;
}

#[async_trait]
impl Beat for GatewayWriter {
    async fn beat(&self) -> Result<(), SessionError> {
        self.heartbeat_now().await.map(|_| ())
    }
}

/// Lifecycle phase of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    /// No hello seen yet
    Idle,
    /// Timer task is beating
    Running,
    /// Timer task has exited
    Stopped,
}

/// Pending instruction for the timer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// Keep waiting out the interval
    None,
    /// Beat immediately and start a fresh interval
    Restart,
    /// Exit the loop
    Kill,
}

/// Snapshot of the driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatState {
    /// Interval announced by hello; fixed once set
    pub interval: Option<Duration>,
    /// Current phase
    pub phase: HeartbeatPhase,
    /// Signal not yet picked up by the timer task
    pub signal: HeartbeatSignal,
}

/// What a call to [`HeartbeatDriver::start`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A timer task was spawned
    Spawned,
    /// A task was already running and was told to restart
    Restarted,
    /// The driver was already stopped; nothing happened
    Stopped,
}

struct Shared {
    state: Mutex<HeartbeatState>,
    wake: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, HeartbeatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_signal(&self) -> HeartbeatSignal {
        std::mem::replace(&mut self.state().signal, HeartbeatSignal::None)
    }

    fn signal(&self, signal: HeartbeatSignal) {
        {
            let mut state = self.state();
            // a pending kill is final; nothing may replace it
            if state.signal == HeartbeatSignal::Kill {
                debug!("Ignoring {:?}; heartbeat kill pending", signal);
                return;
            }
            state.signal = signal;
        }
        // at most one permit is stored, so repeated signals never pile up wakeups
        self.wake.notify_one();
    }
}

/// Handle to the session's single heartbeat timer
#[derive(Clone)]
pub struct HeartbeatDriver {
    shared: Arc<Shared>,
}

impl HeartbeatDriver {
    /// Create an idle driver
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(HeartbeatState {
                    interval: None,
                    phase: HeartbeatPhase::Idle,
                    signal: HeartbeatSignal::None,
                }),
                wake: Notify::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> HeartbeatState {
        *self.shared.state()
    }

    /// Current phase
    pub fn phase(&self) -> HeartbeatPhase {
        self.shared.state().phase
    }

    /// Interval in use, once started
    pub fn interval(&self) -> Option<Duration> {
        self.shared.state().interval
    }

    /// Start beating every `interval`.
    ///
    /// Starting a running driver collapses to [`restart`](Self::restart);
    /// the original interval is kept. A failed beat is sent on `failures`
    /// and stops the driver.
    pub fn start<B: Beat>(
        &self,
        interval: Duration,
        beater: B,
        failures: mpsc::UnboundedSender<SessionError>,
    ) -> StartOutcome {
        {
            let mut state = self.shared.state();
            let phase = state.phase;
            match phase {
                HeartbeatPhase::Running => {
                    if state.interval != Some(interval) {
                        warn!(
                            "Ignoring heartbeat interval change {:?} -> {:?}",
                            state.interval, interval
                        );
                    }
                    drop(state);
                    self.restart();
                    return StartOutcome::Restarted;
                }
                HeartbeatPhase::Stopped => {
                    debug!("Heartbeat driver already stopped; not starting");
                    return StartOutcome::Stopped;
                }
                HeartbeatPhase::Idle => {
                    state.interval = Some(interval);
                    state.phase = HeartbeatPhase::Running;
                    state.signal = HeartbeatSignal::None;
                }
            }
        }

        info!("Starting heartbeat every {:?}", interval);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run(shared, interval, beater, failures));
        *self.shared.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        StartOutcome::Spawned
    }

    /// Beat immediately and restart the interval
    pub fn restart(&self) {
        if self.phase() == HeartbeatPhase::Running {
            self.shared.signal(HeartbeatSignal::Restart);
        }
    }

    /// Stop the timer task; no further beats are sent
    pub fn kill(&self) {
        let mut state = self.shared.state();
        let phase = state.phase;
        match phase {
            HeartbeatPhase::Idle => state.phase = HeartbeatPhase::Stopped,
            HeartbeatPhase::Running => {
                drop(state);
                self.shared.signal(HeartbeatSignal::Kill);
            }
            HeartbeatPhase::Stopped => {}
        }
    }

    /// Wait for the timer task to exit
    pub async fn join(&self) {
        let handle = self
            .shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Heartbeat task ended abnormally: {}", e);
            }
        }
    }
}

impl Default for HeartbeatDriver {
    fn default() -> Self {
        Self::new()
    }
}

async fn run<B: Beat>(
    shared: Arc<Shared>,
    interval: Duration,
    beater: B,
    failures: mpsc::UnboundedSender<SessionError>,
) {
    loop {
        if shared.state().signal == HeartbeatSignal::Kill {
            break;
        }

        if let Err(e) = beater.beat().await {
            error!("Heartbeat failed, stopping: {}", e);
            shared.state().phase = HeartbeatPhase::Stopped;
            let _ = failures.send(e);
            return;
        }

        let deadline = Instant::now() + interval;
        let signal = loop {
            match tokio::time::timeout_at(deadline, shared.wake.notified()).await {
                Err(_) => break shared.take_signal(),
                Ok(()) => match shared.take_signal() {
                    // stale permit from a signal already consumed; keep waiting
                    HeartbeatSignal::None => continue,
                    signal => break signal,
                },
            }
        };

        match signal {
            HeartbeatSignal::Kill => break,
            HeartbeatSignal::Restart => debug!("Heartbeat restarted"),
            HeartbeatSignal::None => {}
        }
    }

    debug!("Heartbeat loop exited");
    let mut state = shared.state();
    state.phase = HeartbeatPhase::Stopped;
    state.signal = HeartbeatSignal::None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::timeout;

    struct Recorder {
        beats: mpsc::UnboundedSender<std::time::Instant>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Beat for Recorder {
        async fn beat(&self) -> Result<(), SessionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SessionError::Write(crate::error::TransportError::Closed));
            }
            let _ = self.beats.send(std::time::Instant::now());
            Ok(())
        }
    }

    fn recorder() -> (Recorder, mpsc::UnboundedReceiver<std::time::Instant>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fail = Arc::new(AtomicBool::new(false));
        (
            Recorder {
                beats: tx,
                fail: Arc::clone(&fail),
            },
            rx,
            fail,
        )
    }

    #[tokio::test]
    async fn test_beats_immediately_then_on_interval() {
        let driver = HeartbeatDriver::new();
        let (beater, mut beats, _) = recorder();
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();

        assert_eq!(driver.phase(), HeartbeatPhase::Idle);
        let started = std::time::Instant::now();
        assert_eq!(
            driver.start(Duration::from_millis(50), beater, fail_tx),
            StartOutcome::Spawned
        );
        assert_eq!(driver.phase(), HeartbeatPhase::Running);

        timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();
        assert!(second.duration_since(started) >= Duration::from_millis(50));

        driver.kill();
        driver.join().await;
    }

    #[tokio::test]
    async fn test_restart_beats_without_waiting_out_interval() {
        let driver = HeartbeatDriver::new();
        let (beater, mut beats, _) = recorder();
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();

        driver.start(Duration::from_secs(30), beater, fail_tx);
        timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let signaled = std::time::Instant::now();
        driver.restart();

        let beat = timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();
        assert!(beat.duration_since(signaled) < Duration::from_secs(1));

        driver.kill();
        driver.join().await;
    }

    #[tokio::test]
    async fn test_second_start_collapses_to_restart() {
        let driver = HeartbeatDriver::new();
        let (beater, mut beats, _) = recorder();
        let (other, mut other_beats, _) = recorder();
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();

        driver.start(Duration::from_secs(30), beater, fail_tx.clone());
        timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();

        assert_eq!(
            driver.start(Duration::from_secs(10), other, fail_tx),
            StartOutcome::Restarted
        );
        // the original timer beats again; no second timer exists
        timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();
        assert!(other_beats.try_recv().is_err());
        assert_eq!(driver.interval(), Some(Duration::from_secs(30)));

        driver.kill();
        driver.join().await;
    }

    #[tokio::test]
    async fn test_kill_stops_beats() {
        let driver = HeartbeatDriver::new();
        let (beater, mut beats, _) = recorder();
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();

        driver.start(Duration::from_secs(30), beater, fail_tx);
        timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();

        driver.kill();
        timeout(Duration::from_millis(200), driver.join()).await.unwrap();
        assert_eq!(driver.phase(), HeartbeatPhase::Stopped);

        // sender was dropped with the task and nothing else was sent
        assert!(beats.recv().await.is_none());

        let (beater, _, _) = recorder();
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();
        assert_eq!(
            driver.start(Duration::from_secs(1), beater, fail_tx),
            StartOutcome::Stopped
        );
    }

    #[tokio::test]
    async fn test_failed_beat_is_reported() {
        let driver = HeartbeatDriver::new();
        let (beater, _beats, fail) = recorder();
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();

        fail.store(true, Ordering::SeqCst);
        driver.start(Duration::from_millis(10), beater, fail_tx);

        let err = timeout(Duration::from_secs(1), fail_rx.recv()).await.unwrap().unwrap();
        assert!(matches!(err, SessionError::Write(_)));
        driver.join().await;
        assert_eq!(driver.phase(), HeartbeatPhase::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_kill_does_not_revive() {
        let driver = HeartbeatDriver::new();
        let (beater, mut beats, _) = recorder();
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();

        driver.start(Duration::from_secs(30), beater, fail_tx.clone());
        timeout(Duration::from_secs(1), beats.recv()).await.unwrap().unwrap();

        driver.kill();
        driver.restart();
        let (other, _, _) = recorder();
        driver.start(Duration::from_secs(30), other, fail_tx);

        timeout(Duration::from_millis(500), driver.join())
            .await
            .expect("driver still running after kill");
        assert_eq!(driver.phase(), HeartbeatPhase::Stopped);
        assert!(beats.recv().await.is_none());
    }

    #[test]
    fn test_kill_while_idle() {
        let driver = HeartbeatDriver::new();
        driver.restart();
        assert_eq!(driver.state().signal, HeartbeatSignal::None);
        driver.kill();
        assert_eq!(driver.phase(), HeartbeatPhase::Stopped);
    }
}
