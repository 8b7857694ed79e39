//! The host's dispatch loop.
//!
//! A [`Runtime`] drives the single logical timeline: each cycle fires due
//! timers, broadcasts a `tick` event, and (optionally) forwards console
//! input lines as `consoleInput` events. On exit it shuts the host down,
//! unloading modules in exact reverse load order.

use crate::host::Host;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Event broadcast once per dispatch cycle.
pub const TICK_EVENT: &str = "tick";

/// Event carrying one line of console input.
pub const CONSOLE_INPUT_EVENT: &str = "consoleInput";

/// Configuration for the dispatch loop.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Period of one dispatch cycle.
    pub tick_period: Duration,

    /// Whether to broadcast [`TICK_EVENT`] each cycle.
    pub tick_event: bool,

    /// Whether to forward stdin lines as [`CONSOLE_INPUT_EVENT`] events.
    pub console_input: bool,

    /// Cycle overrun above which a warning is logged.
    pub max_overrun: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(16),
            tick_event: true,
            console_input: false,
            max_overrun: Duration::from_millis(8),
        }
    }
}

/// Handle for stopping a running loop from another thread or a callback.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    running: Arc<AtomicBool>,
}

impl RuntimeHandle {
    /// Request the loop to exit after the current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Blocking dispatch loop around a [`Host`].
pub struct Runtime {
    host: Host,
    config: RuntimeConfig,
    running: Arc<AtomicBool>,
}

impl Runtime {
    /// Wrap a host with the default configuration.
    pub fn new(host: Host) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    /// Wrap a host with explicit configuration.
    pub fn with_config(host: Host, config: RuntimeConfig) -> Self {
        Self {
            host,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The wrapped host.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// A handle that can stop the loop.
    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            running: self.running.clone(),
        }
    }

    /// Run the dispatch loop until [`RuntimeHandle::stop`] is called, then
    /// shut the host down.
    pub fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        let tick_payload = format!("{}ms", self.config.tick_period.as_millis());

        if self.config.console_input {
            self.spawn_console_reader();
        }

        tracing::info!(
            period_ms = self.config.tick_period.as_millis() as u64,
            "dispatch loop started"
        );

        while self.running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            self.host.tick();
            if self.config.tick_event {
                self.host.events().send(TICK_EVENT, &tick_payload);
            }

            let elapsed = cycle_start.elapsed();
            if elapsed > self.config.tick_period + self.config.max_overrun {
                tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    period_ms = self.config.tick_period.as_millis() as u64,
                    "dispatch cycle overran its period"
                );
            }
            if let Some(remaining) = self.config.tick_period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }

        tracing::info!("dispatch loop stopped");
        self.host.shutdown();
    }

    /// Run for a bounded duration, mainly for demos and tests.
    pub fn run_for(&self, duration: Duration) {
        let handle = self.handle();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(duration);
            handle.stop();
        });
        self.run();
        let _ = stopper.join();
    }

    /// Forward stdin lines to the bus until the loop stops.
    ///
    /// The reader blocks in `read_line`, so it is detached; it exits on EOF
    /// or on the first line read after stop.
    fn spawn_console_reader(&self) {
        let running = self.running.clone();
        let send = self.host.event_sender();

        let spawned = std::thread::Builder::new()
            .name("armature-console".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    match line {
                        Ok(line) if !line.is_empty() => send(CONSOLE_INPUT_EVENT, &line),
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "failed to spawn console reader");
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::CallbackId;
    use std::sync::Mutex;

    #[test]
    fn test_run_for_broadcasts_ticks() {
        let host = Host::new();
        let seen = Arc::new(Mutex::new(0u32));
        {
            let seen = seen.clone();
            host.events().register(
                TICK_EVENT,
                CallbackId::next(),
                Arc::new(move |_, _| {
                    *seen.lock().unwrap() += 1;
                }),
            );
        }

        let runtime = Runtime::with_config(
            host,
            RuntimeConfig {
                tick_period: Duration::from_millis(1),
                ..RuntimeConfig::default()
            },
        );
        runtime.run_for(Duration::from_millis(30));
        assert!(*seen.lock().unwrap() > 0);
    }

    #[test]
    fn test_handle_stops_loop() {
        let runtime = Runtime::new(Host::new());
        let handle = runtime.handle();
        assert!(!handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
    }
}
