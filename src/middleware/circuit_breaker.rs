use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls go through
    Closed,
    /// Calls fail fast until the cooldown elapses
    Open,
    /// Cooldown elapsed; trial calls decide whether to close again
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,
    /// How long the circuit stays open before trial calls are allowed
    pub cooldown: Duration,
    /// Consecutive trial successes needed to close the circuit
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: usize },
    Open { since: Instant },
    HalfOpen { successes: usize },
}

/// Fails calls to the care model fast while it is unhealthy.
///
/// Clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    phase: Arc<Mutex<Phase>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            phase: Arc::new(Mutex::new(Phase::Closed { failures: 0 })),
            config,
        }
    }

    /// Whether a call may be made now; moves Open to HalfOpen once the cooldown is over
    pub fn allow_request(&self) -> bool {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Closed { .. } | Phase::HalfOpen { .. } => true,
            Phase::Open { since } if since.elapsed() >= self.config.cooldown => {
                *phase = Phase::HalfOpen { successes: 0 };
                true
            }
            Phase::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut phase = self.phase.lock();
        *phase = match *phase {
            Phase::HalfOpen { successes } if successes + 1 < self.config.success_threshold => {
                Phase::HalfOpen {
                    successes: successes + 1,
                }
            }
            _ => Phase::Closed { failures: 0 },
        };
    }

    /// Record a failed call. Returns true when this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut phase = self.phase.lock();
        let (next, tripped) = match *phase {
            Phase::Closed { failures } if failures + 1 >= self.config.failure_threshold => {
                (Phase::Open { since: Instant::now() }, true)
            }
            Phase::Closed { failures } => (
                Phase::Closed {
                    failures: failures + 1,
                },
                false,
            ),
            Phase::HalfOpen { .. } => (Phase::Open { since: Instant::now() }, true),
            Phase::Open { .. } => (Phase::Open { since: Instant::now() }, false),
        };
        *phase = next;
        tripped
    }

    pub fn state(&self) -> CircuitState {
        match *self.phase.lock() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn reset(&self) {
        *self.phase.lock() = Phase::Closed { failures: 0 };
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
