//! Sandbox runtime gateway.
//!
//! Manages the boot lifecycle of the external execution environment and
//! streams command output back to the UI loop. The runtime is an opaque
//! collaborator behind the `SandboxBackend` trait; only its boot lifecycle
//! and I/O contract matter here.
//!
//! State machine: `Booting -> Ready` or `Booting -> Failed`, both terminal.
//! Boot runs once, asynchronously, and is never retried automatically; a
//! manual retry re-enters `Booting`. While not `Ready`, forwarded commands
//! are rejected with a user-visible message, never queued.
//!
//! Interrupts settle at the gateway: the in-flight record is dropped the
//! moment the abort is issued, so the session is free immediately even if
//! the worker is stuck in a blocking read; later output is discarded and
//! the worker's eventual completion event is suppressed.

use std::collections::HashMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::session::SessionId;

/// Gateway errors surfaced as terminal entries, never fatal
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("sandbox runtime is still booting, try again shortly")]
    NotReady,
    #[error("sandbox runtime failed to boot: {0}")]
    BootFailed(String),
    #[error("a command is already running in this session")]
    SessionBusy,
}

/// Boot lifecycle of the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeState {
    Booting,
    Ready,
    Failed(String),
}

/// Events delivered to the UI loop as async work completes
#[derive(Debug)]
pub enum SandboxEvent {
    Booted,
    BootFailed(String),
    /// Incremental output for the originating session
    Output {
        session: SessionId,
        chunk: String,
        is_error: bool,
    },
    /// The forwarded command finished (or was aborted)
    Done {
        session: SessionId,
        aborted: bool,
    },
}

/// Execution environment abstraction.
///
/// `probe` models the asynchronous boot; `run` executes one command,
/// pushing output chunks through `sink` and polling `abort` between reads.
pub trait SandboxBackend: Send + Sync + 'static {
    fn probe(&self) -> Result<(), String>;
    fn run(&self, command: &str, abort: &AtomicBool, sink: &mut dyn FnMut(String, bool));
}

/// Backend that runs commands through the configured shell
pub struct ShellBackend {
    shell: String,
}

impl ShellBackend {
    pub fn new(shell: &str) -> Self {
        Self {
            shell: shell.to_string(),
        }
    }
}

impl SandboxBackend for ShellBackend {
    fn probe(&self) -> Result<(), String> {
        // Boot succeeds when the shell can start at all
        match Command::new(&self.shell)
            .arg("-c")
            .arg("exit 0")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(_) => Ok(()),
            Err(e) => Err(format!("{}: {}", self.shell, e)),
        }
    }

    fn run(&self, command: &str, abort: &AtomicBool, sink: &mut dyn FnMut(String, bool)) {
        let mut child = match Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                sink(format!("failed to spawn: {}\n", e), true);
                return;
            }
        };

        let stderr = child.stderr.take();
        let mut stdout = child.stdout.take();
        let child = Mutex::new(child);
        let finished = AtomicBool::new(false);

        let mut stderr_text = String::new();
        thread::scope(|scope| {
            // Drain stderr on a helper thread so neither pipe can fill up
            let stderr_handle = scope.spawn(move || {
                let mut text = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut text);
                }
                text
            });

            // The stdout read blocks, so a silent command would never see
            // the abort flag from the read loop; a watchdog kills the
            // child as soon as the abort is signalled
            scope.spawn(|| {
                while !finished.load(Ordering::SeqCst) {
                    if abort.load(Ordering::SeqCst) {
                        if let Ok(mut child) = child.lock() {
                            let _ = child.kill();
                        }
                        break;
                    }
                    thread::sleep(Duration::from_millis(25));
                }
            });

            if let Some(stdout) = stdout.as_mut() {
                let mut buffer = [0u8; 4096];
                loop {
                    if abort.load(Ordering::SeqCst) {
                        break;
                    }
                    match stdout.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => {
                            let chunk = String::from_utf8_lossy(&buffer[..n]).into_owned();
                            sink(chunk, false);
                        }
                        Err(_) => break,
                    }
                }
            }
            finished.store(true, Ordering::SeqCst);
            stderr_text = stderr_handle.join().unwrap_or_default();
        });

        if !stderr_text.is_empty() && !abort.load(Ordering::SeqCst) {
            sink(stderr_text, true);
        }
        if let Ok(mut child) = child.lock() {
            let _ = child.wait();
        };
    }
}

/// In-flight command bookkeeping
struct InFlight {
    abort: Arc<AtomicBool>,
}

/// Gateway between the UI loop and the execution runtime.
///
/// All state mutation happens on the UI thread via `poll`; worker threads
/// only push events into the channel.
pub struct SandboxRuntime {
    state: RuntimeState,
    backend: Arc<dyn SandboxBackend>,
    tx: Sender<SandboxEvent>,
    rx: Receiver<SandboxEvent>,
    in_flight: HashMap<SessionId, InFlight>,
}

impl SandboxRuntime {
    pub fn new(backend: Arc<dyn SandboxBackend>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: RuntimeState::Booting,
            backend,
            tx,
            rx,
            in_flight: HashMap::new(),
        }
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Kick off the asynchronous boot probe
    pub fn boot(&mut self) {
        self.state = RuntimeState::Booting;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let event = match backend.probe() {
                Ok(()) => SandboxEvent::Booted,
                Err(e) => SandboxEvent::BootFailed(e),
            };
            let _ = tx.send(event);
        });
    }

    /// Manual retry after a failed boot. No-op unless in `Failed`.
    pub fn retry_boot(&mut self) -> bool {
        if matches!(self.state, RuntimeState::Failed(_)) {
            info!("retrying sandbox boot");
            self.boot();
            true
        } else {
            false
        }
    }

    /// Forward a command verbatim to the runtime.
    ///
    /// Rejected (not queued) while the runtime is not `Ready` or the
    /// session already has a command pending.
    pub fn forward(&mut self, session: SessionId, command: &str) -> Result<(), SandboxError> {
        match &self.state {
            RuntimeState::Booting => return Err(SandboxError::NotReady),
            RuntimeState::Failed(reason) => {
                return Err(SandboxError::BootFailed(reason.clone()))
            }
            RuntimeState::Ready => {}
        }
        if self.in_flight.contains_key(&session) {
            return Err(SandboxError::SessionBusy);
        }

        let abort = Arc::new(AtomicBool::new(false));
        self.in_flight.insert(
            session,
            InFlight {
                abort: abort.clone(),
            },
        );

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let command = command.to_string();
        thread::spawn(move || {
            let chunk_tx = tx.clone();
            let mut sink = move |chunk: String, is_error: bool| {
                let _ = chunk_tx.send(SandboxEvent::Output {
                    session,
                    chunk,
                    is_error,
                });
            };
            backend.run(&command, &abort, &mut sink);
            let _ = tx.send(SandboxEvent::Done {
                session,
                aborted: abort.load(Ordering::SeqCst),
            });
        });
        Ok(())
    }

    /// Abort a pending command, settling the session immediately.
    ///
    /// The in-flight record is dropped right away so the session stops
    /// waiting and can run again regardless of whether the backend honors
    /// the signal; output arriving afterwards is dropped at the gateway
    /// and the worker's eventual completion event is suppressed.
    pub fn interrupt(&mut self, session: SessionId) -> bool {
        if let Some(pending) = self.in_flight.remove(&session) {
            pending.abort.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Drain one pending event, applying boot transitions internally.
    ///
    /// Called from the UI loop; never blocks.
    pub fn poll(&mut self) -> Option<SandboxEvent> {
        loop {
            let event = match self.rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            };
            match &event {
                SandboxEvent::Booted => {
                    info!("sandbox runtime ready");
                    self.state = RuntimeState::Ready;
                }
                SandboxEvent::BootFailed(reason) => {
                    warn!("sandbox boot failed: {}", reason);
                    self.state = RuntimeState::Failed(reason.clone());
                }
                SandboxEvent::Output { session, .. } => {
                    // Drop output for sessions that were interrupted or closed
                    let interrupted = self
                        .in_flight
                        .get(session)
                        .map(|p| p.abort.load(Ordering::SeqCst))
                        .unwrap_or(true);
                    if interrupted {
                        continue;
                    }
                }
                SandboxEvent::Done { session, aborted } => {
                    // Interrupted commands were settled when the abort was
                    // issued; their workers still report in, silently
                    if *aborted || self.in_flight.remove(session).is_none() {
                        continue;
                    }
                }
            }
            return Some(event);
        }
    }

    /// Drop bookkeeping for a closed session
    pub fn forget_session(&mut self, session: SessionId) {
        if let Some(pending) = self.in_flight.remove(&session) {
            pending.abort.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Backend with scripted behavior for unit tests
    pub struct FakeBackend {
        pub boot_result: Result<(), String>,
        pub output: Vec<(String, bool)>,
        /// After the scripted output, hang without producing anything
        /// until aborted (models a silent long-running command)
        pub block_until_abort: bool,
    }

    impl SandboxBackend for FakeBackend {
        fn probe(&self) -> Result<(), String> {
            self.boot_result.clone()
        }

        fn run(&self, _command: &str, abort: &AtomicBool, sink: &mut dyn FnMut(String, bool)) {
            for (chunk, is_error) in &self.output {
                if abort.load(Ordering::SeqCst) {
                    return;
                }
                sink(chunk.clone(), *is_error);
            }
            while self.block_until_abort && !abort.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for<F: FnMut(&mut SandboxRuntime) -> bool>(
        runtime: &mut SandboxRuntime,
        mut done: F,
    ) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done(runtime) {
            assert!(Instant::now() < deadline, "timed out waiting for event");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_boot_transitions_to_ready() {
        let backend = Arc::new(FakeBackend {
            boot_result: Ok(()),
            output: vec![],
            block_until_abort: false,
        });
        let mut runtime = SandboxRuntime::new(backend);
        assert_eq!(*runtime.state(), RuntimeState::Booting);
        runtime.boot();
        wait_for(&mut runtime, |r| {
            r.poll();
            *r.state() == RuntimeState::Ready
        });
    }

    #[test]
    fn test_boot_failure_is_terminal_until_manual_retry() {
        let backend = Arc::new(FakeBackend {
            boot_result: Err("no runtime".to_string()),
            output: vec![],
            block_until_abort: false,
        });
        let mut runtime = SandboxRuntime::new(backend);
        runtime.boot();
        wait_for(&mut runtime, |r| {
            r.poll();
            matches!(r.state(), RuntimeState::Failed(_))
        });
        // Forward is rejected, nothing queued
        assert!(matches!(
            runtime.forward(1, "npm run build"),
            Err(SandboxError::BootFailed(_))
        ));
        // Manual retry re-enters Booting
        assert!(runtime.retry_boot());
        assert_eq!(*runtime.state(), RuntimeState::Booting);
    }

    #[test]
    fn test_forward_while_booting_is_rejected() {
        let backend = Arc::new(FakeBackend {
            boot_result: Ok(()),
            output: vec![],
            block_until_abort: false,
        });
        let mut runtime = SandboxRuntime::new(backend);
        // Boot not even started: still Booting, command must be rejected
        assert_eq!(
            runtime.forward(1, "npm run build"),
            Err(SandboxError::NotReady)
        );
    }

    #[test]
    fn test_forward_streams_output_then_done() {
        let backend = Arc::new(FakeBackend {
            boot_result: Ok(()),
            output: vec![
                ("chunk one ".to_string(), false),
                ("chunk two".to_string(), false),
            ],
            block_until_abort: false,
        });
        let mut runtime = SandboxRuntime::new(backend);
        runtime.boot();
        wait_for(&mut runtime, |r| {
            r.poll();
            *r.state() == RuntimeState::Ready
        });

        runtime.forward(7, "build").unwrap();
        let mut chunks = String::new();
        let mut done = false;
        wait_for(&mut runtime, |r| {
            while let Some(event) = r.poll() {
                match event {
                    SandboxEvent::Output { session, chunk, .. } => {
                        assert_eq!(session, 7);
                        chunks.push_str(&chunk);
                    }
                    SandboxEvent::Done { session, aborted } => {
                        assert_eq!(session, 7);
                        assert!(!aborted);
                        done = true;
                    }
                    _ => {}
                }
            }
            done
        });
        assert_eq!(chunks, "chunk one chunk two");
    }

    #[test]
    fn test_interrupt_silent_command_frees_session_immediately() {
        // A command producing no output never reaches a cooperative abort
        // check; the session must still settle the moment the interrupt
        // is issued
        let backend = Arc::new(FakeBackend {
            boot_result: Ok(()),
            output: vec![],
            block_until_abort: true,
        });
        let mut runtime = SandboxRuntime::new(backend);
        runtime.boot();
        wait_for(&mut runtime, |r| {
            r.poll();
            *r.state() == RuntimeState::Ready
        });

        runtime.forward(1, "sleep 30").unwrap();
        assert!(runtime.interrupt(1));
        // No longer busy: a new command is accepted right away
        assert!(runtime.forward(1, "sleep 30").is_ok());
        assert!(runtime.interrupt(1));
        assert!(!runtime.interrupt(1));

        // Both workers report in eventually; their completions are
        // swallowed and no event ever surfaces
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            assert!(runtime.poll().is_none());
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_abort_discards_pending_output_and_done() {
        let backend = Arc::new(FakeBackend {
            boot_result: Ok(()),
            output: vec![("partial".to_string(), false)],
            block_until_abort: false,
        });
        let mut runtime = SandboxRuntime::new(backend);
        runtime.boot();
        wait_for(&mut runtime, |r| {
            r.poll();
            *r.state() == RuntimeState::Ready
        });

        runtime.forward(3, "build").unwrap();
        // Interrupt before draining: anything the worker already queued
        // must be dropped at the gateway, not rendered
        assert!(runtime.interrupt(3));
        let deadline = Instant::now() + Duration::from_millis(300);
        while Instant::now() < deadline {
            assert!(runtime.poll().is_none());
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_second_command_in_same_session_is_busy() {
        let backend = Arc::new(FakeBackend {
            boot_result: Ok(()),
            output: vec![],
            block_until_abort: false,
        });
        let mut runtime = SandboxRuntime::new(backend);
        runtime.boot();
        wait_for(&mut runtime, |r| {
            r.poll();
            *r.state() == RuntimeState::Ready
        });

        runtime.forward(1, "sleep").unwrap();
        assert_eq!(
            runtime.forward(1, "echo"),
            Err(SandboxError::SessionBusy)
        );
    }
}
