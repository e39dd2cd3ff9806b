//! Circuit breaker over consecutive sync failures.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::watch;

/// Consecutive failures before the breaker trips.
const TRIP_THRESHOLD: u32 = 5;
/// Cooldown after the first trip.
const BASE_COOLDOWN_SECS: u64 = 30;
/// Ceiling on the cooldown, however many times we have tripped.
const MAX_COOLDOWN_SECS: u64 = 300;

/// Externally visible breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed,
    Open {
        since: DateTime<Utc>,
        cooldown: Duration,
    },
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: State,
    consecutive_failures: u32,
    trip_count: u32,
}

/// Failure-counting state machine: `Closed → Open → HalfOpen → Closed` with
/// an exponentially growing cooldown on repeated trips.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    signal: watch::Sender<BreakerPhase>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(BreakerPhase::Closed);
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                trip_count: 0,
            }),
            signal,
        }
    }

    /// Subscribe to phase transitions.
    pub fn phase_changes(&self) -> watch::Receiver<BreakerPhase> {
        self.signal.subscribe()
    }

    pub fn phase(&self) -> BreakerPhase {
        match self.lock().state {
            State::Closed => BreakerPhase::Closed,
            State::Open { .. } => BreakerPhase::Open,
            State::HalfOpen => BreakerPhase::HalfOpen,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cooldown_for_trip(trip_count: u32) -> Duration {
        let exp = trip_count.min(8);
        Duration::from_secs((BASE_COOLDOWN_SECS << exp).min(MAX_COOLDOWN_SECS))
    }

    /// Whether a sync run may start. An open breaker whose cooldown elapsed
    /// moves to half-open and admits exactly one probe.
    pub fn should_allow_sync(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open { since, cooldown } => {
                let elapsed = (now - since).to_std().unwrap_or_default();
                if elapsed >= cooldown {
                    info!("[Sync] Circuit breaker half-open after {:?} cooldown", cooldown);
                    inner.state = State::HalfOpen;
                    drop(inner);
                    self.signal.send_replace(BreakerPhase::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        let was_open = !matches!(inner.state, State::Closed);
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.trip_count = 0;
        drop(inner);
        if was_open {
            info!("[Sync] Circuit breaker closed");
            self.signal.send_replace(BreakerPhase::Closed);
        }
    }

    pub fn record_failure(&self, now: DateTime<Utc>) {
        let mut inner = self.lock();
        match inner.state {
            State::HalfOpen => {
                // probe failed: re-open with a longer cooldown
                let cooldown = Self::cooldown_for_trip(inner.trip_count);
                inner.trip_count += 1;
                inner.state = State::Open {
                    since: now,
                    cooldown,
                };
                drop(inner);
                warn!("[Sync] Circuit breaker re-opened for {:?}", cooldown);
                self.signal.send_replace(BreakerPhase::Open);
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= TRIP_THRESHOLD {
                    let cooldown = Self::cooldown_for_trip(inner.trip_count);
                    inner.trip_count += 1;
                    inner.state = State::Open {
                        since: now,
                        cooldown,
                    };
                    drop(inner);
                    warn!(
                        "[Sync] Circuit breaker tripped after {} consecutive failures; cooling down {:?}",
                        TRIP_THRESHOLD, cooldown
                    );
                    self.signal.send_replace(BreakerPhase::Open);
                }
            }
            State::Open { .. } => {}
        }
    }
}
