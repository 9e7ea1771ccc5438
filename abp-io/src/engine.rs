//! Generic engine run loop
//!
//! An [`Engine`] owns a [`StateMachine`] and drives it on a dedicated thread:
//! one `transition()` per tick, forever, until it is asked to stop. Stopping
//! is cooperative and deferred. [`EngineHandle::terminate`] only raises a
//! flag; the loop exits at the first iteration where the flag is set *and*
//! the machine reports a safe terminal state, so a process is never stopped
//! halfway through an exchange with its peer.
//!
//! [`EngineHandle::abort`] is the escape hatch for a dead peer: it stops the
//! loop regardless of state and reports [`EngineError::Aborted`].
//!
//! The loop never blocks on input. Machines poll their channels and timers,
//! and the per-tick pause is the only suspension point, which keeps the
//! termination flag observed on the same cadence as everything else.

use parking_lot::RwLock;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// A process that can be stepped by an [`Engine`]
pub trait StateMachine: Send + 'static {
    /// Error that aborts the run loop
    type Error: std::error::Error + Send + 'static;

    /// Short name used for the engine thread and in diagnostics
    fn name(&self) -> &'static str;

    /// Execute exactly one protocol step
    fn transition(&mut self) -> Result<(), Self::Error>;

    /// Whether the machine may be stopped in its current state
    fn is_safe_terminal(&self) -> bool;

    /// Current state as a plain index, for statistics
    fn state_index(&self) -> u8;
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError<E>
where
    E: std::error::Error + 'static,
{
    #[error("Failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Engine '{name}' stopped at step {step}: {source}")]
    Transition {
        name: &'static str,
        step: u64,
        #[source]
        source: E,
    },

    #[error("Engine '{name}' panicked: {message}")]
    Panicked { name: &'static str, message: String },

    #[error("Engine '{name}' aborted at step {step} in state {state}")]
    Aborted {
        name: &'static str,
        step: u64,
        state: u8,
    },
}

/// Engine timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between two steps. Zero yields the thread instead of sleeping.
    pub tick: Duration,
    /// Delay before the first step is taken
    pub start_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tick: Duration::from_millis(1),
            start_delay: Duration::ZERO,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with the given tick and no start delay
    pub fn with_tick(tick: Duration) -> Self {
        EngineConfig {
            tick,
            start_delay: Duration::ZERO,
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of transitions executed
    pub steps: u64,
    /// State index after the most recent transition
    pub state: u8,
    /// Whether the run loop is still active
    pub running: bool,
}

/// An engine that has not been started yet
pub struct Engine<M: StateMachine> {
    machine: M,
    config: EngineConfig,
}

impl<M: StateMachine> Engine<M> {
    /// Create a new engine around a state machine
    pub fn new(machine: M, config: EngineConfig) -> Self {
        Engine { machine, config }
    }

    /// Get the engine configuration
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Start the run loop on a new named thread
    pub fn spawn(self) -> Result<EngineHandle<M>, EngineError<M::Error>> {
        let name = self.machine.name();
        let terminate = Arc::new(AtomicBool::new(false));
        let abort = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(RwLock::new(EngineStats {
            steps: 0,
            state: self.machine.state_index(),
            running: true,
        }));

        let thread = {
            let flags = Flags {
                terminate: Arc::clone(&terminate),
                abort: Arc::clone(&abort),
            };
            let stats = Arc::clone(&stats);
            let Engine { machine, config } = self;
            thread::Builder::new()
                .name(format!("abp-{}", name))
                .spawn(move || run_loop(machine, config, &flags, &stats))
                .map_err(EngineError::Spawn)?
        };

        Ok(EngineHandle {
            name,
            terminate,
            abort,
            stats,
            thread,
        })
    }
}

struct Flags {
    terminate: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
}

fn run_loop<M: StateMachine>(
    mut machine: M,
    config: EngineConfig,
    flags: &Flags,
    stats: &RwLock<EngineStats>,
) -> Result<M, EngineError<M::Error>> {
    let name = machine.name();
    if !config.start_delay.is_zero() {
        tracing::debug!(engine = name, delay = ?config.start_delay, "Delaying engine start");
        thread::sleep(config.start_delay);
    }
    tracing::info!(engine = name, tick = ?config.tick, "Engine started");

    let mut steps = 0u64;
    let result = loop {
        if flags.abort.load(Ordering::Acquire) {
            break Err(EngineError::Aborted {
                name,
                step: steps,
                state: machine.state_index(),
            });
        }
        if flags.terminate.load(Ordering::Acquire) && machine.is_safe_terminal() {
            break Ok(());
        }

        if let Err(source) = machine.transition() {
            break Err(EngineError::Transition {
                name,
                step: steps,
                source,
            });
        }
        steps += 1;

        {
            let mut s = stats.write();
            s.steps = steps;
            s.state = machine.state_index();
        }

        pause(config.tick);
    };

    stats.write().running = false;
    match &result {
        Ok(()) => tracing::info!(
            engine = name,
            steps,
            state = machine.state_index(),
            "Engine stopped"
        ),
        Err(e) => tracing::error!(engine = name, steps, "Engine aborted: {}", e),
    }
    result.map(|()| machine)
}

fn pause(tick: Duration) {
    if tick.is_zero() {
        thread::yield_now();
    } else {
        thread::sleep(tick);
    }
}

/// Handle to a running engine
pub struct EngineHandle<M: StateMachine> {
    name: &'static str,
    terminate: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    stats: Arc<RwLock<EngineStats>>,
    thread: JoinHandle<Result<M, EngineError<M::Error>>>,
}

impl<M: StateMachine> EngineHandle<M> {
    /// Name of the machine driven by this engine
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request a stop at the next safe terminal state
    pub fn terminate(&self) {
        tracing::debug!(engine = self.name, "Termination requested");
        self.terminate.store(true, Ordering::Release);
    }

    /// Stop at the next tick whatever the state, discarding the machine
    pub fn abort(&self) {
        tracing::warn!(engine = self.name, "Abort requested");
        self.abort.store(true, Ordering::Release);
    }

    /// Check if termination has been requested
    pub fn is_terminating(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    /// Check if the engine thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Get a snapshot of the engine statistics
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Wait for the engine to stop, returning the machine and final statistics
    pub fn join_with_stats(self) -> (Result<M, EngineError<M::Error>>, EngineStats) {
        let stats = Arc::clone(&self.stats);
        let result = self.join();
        let snapshot = stats.read().clone();
        (result, snapshot)
    }

    /// Wait for the engine to stop and take the machine back
    pub fn join(self) -> Result<M, EngineError<M::Error>> {
        let name = self.name;
        match self.thread.join() {
            Ok(result) => result,
            Err(payload) => Err(EngineError::Panicked {
                name,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Error, Debug)]
    #[error("counter overflowed at {0}")]
    struct Overflow(u32);

    /// Counts modulo 4; only even values are safe to stop at
    struct Counter {
        value: u32,
        limit: Option<u32>,
        total: u32,
    }

    impl Counter {
        fn new() -> Self {
            Counter {
                value: 0,
                limit: None,
                total: 0,
            }
        }
    }

    impl StateMachine for Counter {
        type Error = Overflow;

        fn name(&self) -> &'static str {
            "counter"
        }

        fn transition(&mut self) -> Result<(), Overflow> {
            if let Some(limit) = self.limit {
                if self.total >= limit {
                    return Err(Overflow(self.total));
                }
            }
            self.value = (self.value + 1) % 4;
            self.total += 1;
            Ok(())
        }

        fn is_safe_terminal(&self) -> bool {
            self.value % 2 == 0
        }

        fn state_index(&self) -> u8 {
            self.value as u8
        }
    }

    struct Panicker;

    impl StateMachine for Panicker {
        type Error = Overflow;

        fn name(&self) -> &'static str {
            "panicker"
        }

        fn transition(&mut self) -> Result<(), Overflow> {
            panic!("boom");
        }

        fn is_safe_terminal(&self) -> bool {
            false
        }

        fn state_index(&self) -> u8 {
            0
        }
    }

    fn wait_for_steps<M: StateMachine>(handle: &EngineHandle<M>, steps: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.stats().steps < steps && Instant::now() < deadline {
            thread::yield_now();
        }
    }

    #[test]
    fn test_stops_in_safe_state() {
        let handle = Engine::new(Counter::new(), EngineConfig::with_tick(Duration::ZERO))
            .spawn()
            .unwrap();
        wait_for_steps(&handle, 10);

        handle.terminate();
        assert!(handle.is_terminating());
        let counter = handle.join().unwrap();

        assert!(counter.is_safe_terminal());
        assert!(counter.total >= 10);
    }

    #[test]
    fn test_terminate_before_first_step() {
        let config = EngineConfig {
            tick: Duration::ZERO,
            start_delay: Duration::from_millis(20),
        };
        let handle = Engine::new(Counter::new(), config).spawn().unwrap();
        handle.terminate();

        // State 0 is safe, so no step is ever taken
        let counter = handle.join().unwrap();
        assert_eq!(counter.total, 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let handle = Engine::new(Counter::new(), EngineConfig::with_tick(Duration::ZERO))
            .spawn()
            .unwrap();
        assert_eq!(handle.name(), "counter");
        wait_for_steps(&handle, 3);
        assert!(handle.stats().running);

        handle.terminate();
        let (result, final_stats) = handle.join_with_stats();
        let counter = result.unwrap();

        assert!(!final_stats.running);
        assert_eq!(final_stats.steps, counter.total as u64);
        assert_eq!(final_stats.state, counter.value as u8);
    }

    #[test]
    fn test_transition_error_is_returned() {
        let mut counter = Counter::new();
        counter.limit = Some(5);
        let handle = Engine::new(counter, EngineConfig::with_tick(Duration::ZERO))
            .spawn()
            .unwrap();

        match handle.join() {
            Err(EngineError::Transition { name, step, source }) => {
                assert_eq!(name, "counter");
                assert_eq!(step, 5);
                assert_eq!(source.0, 5);
            }
            _ => panic!("expected transition error"),
        }
    }

    #[test]
    fn test_abort_ignores_safe_states() {
        struct Stuck;

        impl StateMachine for Stuck {
            type Error = Overflow;

            fn name(&self) -> &'static str {
                "stuck"
            }

            fn transition(&mut self) -> Result<(), Overflow> {
                Ok(())
            }

            fn is_safe_terminal(&self) -> bool {
                false
            }

            fn state_index(&self) -> u8 {
                2
            }
        }

        let handle = Engine::new(Stuck, EngineConfig::with_tick(Duration::ZERO))
            .spawn()
            .unwrap();
        wait_for_steps(&handle, 3);
        handle.terminate();
        handle.abort();

        match handle.join() {
            Err(EngineError::Aborted { name, state, .. }) => {
                assert_eq!(name, "stuck");
                assert_eq!(state, 2);
            }
            _ => panic!("expected abort error"),
        }
    }

    #[test]
    fn test_panic_is_reported() {
        let handle = Engine::new(Panicker, EngineConfig::default())
            .spawn()
            .unwrap();

        match handle.join() {
            Err(EngineError::Panicked { name, message }) => {
                assert_eq!(name, "panicker");
                assert_eq!(message, "boom");
            }
            _ => panic!("expected panic error"),
        }
    }
}
