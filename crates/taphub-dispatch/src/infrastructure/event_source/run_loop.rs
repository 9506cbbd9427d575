//! Run-loop-hosted event source.
//!
//! Real OS interception points must be installed from a thread that owns a
//! message/run loop, and installation is slow enough that it must never
//! happen on a caller's thread while dispatcher locks are held. This module
//! provides the lifecycle host: enabling spawns a supervisor thread, the
//! supervisor spawns the run-loop-owning thread, the run-loop thread installs
//! the backend and acknowledges setup through a one-shot signal, and only
//! then does the supervisor record the thread handles and mark the source
//! running.
//!
//! The OS-specific triple (install / run / uninstall) is injected via
//! [`TapBackend`], so this host carries no FFI of its own; tests drive it
//! with a recording backend.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex,
};
use std::thread;

use tracing::{debug, warn};

use super::{EventDelegate, EventSource, SourceError};

/// OS-specific interception backend hosted by [`RunLoopEventSource`].
pub trait TapBackend: Send + Sync + 'static {
    /// Installs the interception point. Invoked on the dedicated run-loop
    /// thread, before the setup signal fires.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InstallFailed`] when the OS refuses the tap;
    /// the source then stays disabled.
    fn install(&self, delegate: Arc<dyn EventDelegate>) -> Result<(), SourceError>;

    /// Runs the loop on the run-loop thread, returning once `stop` is raised.
    fn run(&self, stop: &AtomicBool);

    /// Removes the interception point. Invoked on the run-loop thread after
    /// [`run`](Self::run) returns.
    fn uninstall(&self);
}

/// Lifecycle of the hosted tap.
enum Lifecycle {
    Disabled,
    /// Supervisor dispatched; run-loop setup not yet acknowledged.
    Starting { stop: Arc<AtomicBool> },
    /// Setup acknowledged; the run-loop thread handle is held for the
    /// lifetime of the tap.
    Running {
        stop: Arc<AtomicBool>,
        #[allow(dead_code)]
        run_loop: thread::JoinHandle<()>,
    },
}

/// [`EventSource`] hosting a [`TapBackend`] on a dedicated run-loop thread.
pub struct RunLoopEventSource {
    backend: Arc<dyn TapBackend>,
    delegate: Arc<dyn EventDelegate>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl RunLoopEventSource {
    /// Creates a new (disabled) source for `backend`, delivering to
    /// `delegate`.
    pub fn new(backend: Arc<dyn TapBackend>, delegate: Arc<dyn EventDelegate>) -> Self {
        Self {
            backend,
            delegate,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Disabled)),
        }
    }

    fn enable(&self) -> Result<(), SourceError> {
        let stop = Arc::new(AtomicBool::new(false));
        {
            let mut state = self.lifecycle.lock().expect("lock poisoned");
            if !matches!(*state, Lifecycle::Disabled) {
                return Ok(());
            }
            *state = Lifecycle::Starting {
                stop: Arc::clone(&stop),
            };
        }

        let backend = Arc::clone(&self.backend);
        let delegate = Arc::clone(&self.delegate);
        let lifecycle = Arc::clone(&self.lifecycle);

        // The supervisor stands up the run loop off-thread so the caller
        // never blocks on tap installation.
        let spawned = thread::Builder::new()
            .name("taphub-supervisor".to_string())
            .spawn(move || supervise(backend, delegate, lifecycle, stop))
            .map_err(|source| SourceError::ThreadSpawn {
                thread: "taphub-supervisor",
                source,
            });

        if let Err(err) = spawned {
            *self.lifecycle.lock().expect("lock poisoned") = Lifecycle::Disabled;
            return Err(err);
        }
        Ok(())
    }

    fn disable(&self) {
        // Handles are invalidated synchronously under the lifecycle lock;
        // the run-loop thread observes the stop flag and tears itself down.
        let mut state = self.lifecycle.lock().expect("lock poisoned");
        match std::mem::replace(&mut *state, Lifecycle::Disabled) {
            Lifecycle::Disabled => {}
            Lifecycle::Starting { stop } | Lifecycle::Running { stop, .. } => {
                stop.store(true, Ordering::SeqCst);
                debug!("event tap stop requested");
            }
        }
    }
}

impl EventSource for RunLoopEventSource {
    fn set_enabled(&self, enabled: bool) -> Result<(), SourceError> {
        if enabled {
            self.enable()
        } else {
            self.disable();
            Ok(())
        }
    }

    fn is_enabled(&self) -> bool {
        matches!(
            *self.lifecycle.lock().expect("lock poisoned"),
            Lifecycle::Starting { .. } | Lifecycle::Running { .. }
        )
    }
}

/// Supervisor body: spawns the run-loop thread, waits for its setup signal,
/// then records the handles.
fn supervise(
    backend: Arc<dyn TapBackend>,
    delegate: Arc<dyn EventDelegate>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    stop: Arc<AtomicBool>,
) {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SourceError>>();

    let loop_backend = Arc::clone(&backend);
    let loop_stop = Arc::clone(&stop);
    let spawned = thread::Builder::new()
        .name("taphub-run-loop".to_string())
        .spawn(move || {
            match loop_backend.install(delegate) {
                Ok(()) => {
                    // Setup complete; unblock the supervisor, then own the
                    // loop until asked to stop.
                    let _ = ready_tx.send(Ok(()));
                    loop_backend.run(&loop_stop);
                    loop_backend.uninstall();
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            }
        });

    let run_loop = match spawned {
        Ok(join) => join,
        Err(err) => {
            warn!(%err, "failed to spawn run-loop thread");
            *lifecycle.lock().expect("lock poisoned") = Lifecycle::Disabled;
            return;
        }
    };

    // One-shot setup signal: blocks until the run-loop thread reports.
    match ready_rx.recv() {
        Ok(Ok(())) => {
            let mut state = lifecycle.lock().expect("lock poisoned");
            if matches!(*state, Lifecycle::Starting { .. }) && !stop.load(Ordering::SeqCst) {
                debug!("event tap installed");
                *state = Lifecycle::Running { stop, run_loop };
            } else {
                // Disabled while starting: tear the fresh loop back down.
                stop.store(true, Ordering::SeqCst);
            }
        }
        Ok(Err(err)) => {
            warn!(%err, "event tap installation failed");
            *lifecycle.lock().expect("lock poisoned") = Lifecycle::Disabled;
        }
        Err(_) => {
            // Run-loop thread died before signalling.
            warn!("run-loop thread exited before completing setup");
            *lifecycle.lock().expect("lock poisoned") = Lifecycle::Disabled;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::{Duration, Instant};
    use taphub_core::RawEvent;

    struct ForwardAll;

    impl EventDelegate for ForwardAll {
        fn deliver(&self, event: RawEvent) -> Option<RawEvent> {
            Some(event)
        }
    }

    /// Backend that records install/uninstall calls and spins until stopped.
    struct RecordingBackend {
        installs: AtomicU32,
        uninstalls: AtomicU32,
        fail_install: bool,
    }

    impl RecordingBackend {
        fn new(fail_install: bool) -> Self {
            Self {
                installs: AtomicU32::new(0),
                uninstalls: AtomicU32::new(0),
                fail_install,
            }
        }
    }

    impl TapBackend for RecordingBackend {
        fn install(&self, _delegate: Arc<dyn EventDelegate>) -> Result<(), SourceError> {
            if self.fail_install {
                return Err(SourceError::InstallFailed("no permission".to_string()));
            }
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn run(&self, stop: &AtomicBool) {
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn uninstall(&self) {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Polls `cond` until it holds or the deadline passes.
    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_enable_installs_backend_and_reports_enabled() {
        // Arrange
        let backend = Arc::new(RecordingBackend::new(false));
        let source = RunLoopEventSource::new(Arc::clone(&backend) as _, Arc::new(ForwardAll));

        // Act
        source.set_enabled(true).expect("enable");

        // Assert – enabled immediately (Starting), installed shortly after
        assert!(source.is_enabled());
        assert!(wait_until(|| backend.installs.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_enable_is_idempotent() {
        // Arrange
        let backend = Arc::new(RecordingBackend::new(false));
        let source = RunLoopEventSource::new(Arc::clone(&backend) as _, Arc::new(ForwardAll));

        // Act
        source.set_enabled(true).expect("enable");
        source.set_enabled(true).expect("redundant enable");
        assert!(wait_until(|| backend.installs.load(Ordering::SeqCst) >= 1));
        thread::sleep(Duration::from_millis(20));

        // Assert – one install despite two enables
        assert_eq!(backend.installs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disable_stops_loop_and_uninstalls() {
        // Arrange
        let backend = Arc::new(RecordingBackend::new(false));
        let source = RunLoopEventSource::new(Arc::clone(&backend) as _, Arc::new(ForwardAll));
        source.set_enabled(true).expect("enable");
        assert!(wait_until(|| backend.installs.load(Ordering::SeqCst) == 1));

        // Act
        source.set_enabled(false).expect("disable");

        // Assert – disabled immediately, loop tears down shortly after
        assert!(!source.is_enabled());
        assert!(wait_until(|| backend.uninstalls.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_failed_install_returns_to_disabled() {
        // Arrange
        let backend = Arc::new(RecordingBackend::new(true));
        let source = RunLoopEventSource::new(Arc::clone(&backend) as _, Arc::new(ForwardAll));

        // Act
        source.set_enabled(true).expect("enable request itself succeeds");

        // Assert – once the supervisor observes the failure, state resets
        assert!(wait_until(|| !source.is_enabled()));
        assert_eq!(backend.uninstalls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disable_while_starting_tears_down() {
        // Arrange
        let backend = Arc::new(RecordingBackend::new(false));
        let source = RunLoopEventSource::new(Arc::clone(&backend) as _, Arc::new(ForwardAll));

        // Act – disable immediately after enable, racing the supervisor
        source.set_enabled(true).expect("enable");
        source.set_enabled(false).expect("disable");

        // Assert – whichever side of the race wins, the tap is installed
        // once and torn down once
        assert!(!source.is_enabled());
        assert!(wait_until(|| backend.installs.load(Ordering::SeqCst) == 1));
        assert!(wait_until(|| backend.uninstalls.load(Ordering::SeqCst) == 1));
    }
}
