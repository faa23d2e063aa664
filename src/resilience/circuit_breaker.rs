//! Three-state circuit breaker guarding a downstream dependency.
//!
//! - **Closed**: calls pass through; consecutive failures are counted.
//! - **Open**: calls are rejected without touching the dependency until the
//!   reset interval elapses.
//! - **HalfOpen**: exactly one probe is admitted. Success closes the circuit,
//!   failure re-opens it for another reset interval.
//!
//! Every admitted call, probe or not, is bounded by `call_timeout`; a timeout
//! counts as a failure.
//!
//! The breaker is a cheap handle around shared state: clone it to share one
//! circuit across tasks.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_interval: Duration,
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_interval: Duration::from_secs(5),
            call_timeout: Duration::from_secs(3),
        }
    }
}

/// Observable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        })
    }
}

#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    Open(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug, Clone, Copy)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    /// A probe is in flight. If it has not reported back by `probe_deadline`
    /// (its future was dropped), the next caller becomes the probe.
    HalfOpen { probe_deadline: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// Bumped on every transition; outcomes of calls admitted under an older
    /// generation are ignored.
    generation: u64,
}

impl Inner {
    fn transition(&mut self, next: BreakerState) {
        self.state = next;
        self.generation += 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Permit {
    generation: u64,
    probe: bool,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name),
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: BreakerState::Closed { consecutive_failures: 0 },
                generation: 0,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. An open circuit whose reset interval has elapsed reports
    /// `HalfOpen`, since the next call will be admitted as a probe.
    pub fn state(&self) -> CircuitState {
        match self.lock().state {
            BreakerState::Closed { .. } => CircuitState::Closed,
            BreakerState::Open { until } if Instant::now() < until => CircuitState::Open,
            BreakerState::Open { .. } | BreakerState::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Runs `operation` through the breaker.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire()?;

        match tokio::time::timeout(self.config.call_timeout, operation()).await {
            Ok(Ok(value)) => {
                self.on_success(permit);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.on_failure(permit);
                Err(CircuitBreakerError::Inner(err))
            }
            Err(_) => {
                self.on_failure(permit);
                Err(CircuitBreakerError::Timeout(self.config.call_timeout))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire<E>(&self) -> Result<Permit, CircuitBreakerError<E>> {
        let mut inner = self.lock();
        let now = Instant::now();
        let state = inner.state;
        match state {
            BreakerState::Closed { .. } => Ok(Permit {
                generation: inner.generation,
                probe: false,
            }),
            BreakerState::Open { until } if now >= until => self.admit_probe(&mut inner, now),
            BreakerState::HalfOpen { probe_deadline } if now >= probe_deadline => {
                self.admit_probe(&mut inner, now)
            }
            BreakerState::Open { .. } | BreakerState::HalfOpen { .. } => {
                Err(CircuitBreakerError::Open(self.name.to_string()))
            }
        }
    }

    fn admit_probe<E>(&self, inner: &mut Inner, now: Instant) -> Result<Permit, CircuitBreakerError<E>> {
        inner.transition(BreakerState::HalfOpen {
            probe_deadline: now + self.config.call_timeout,
        });
        tracing::info!(breaker = %self.name, "Circuit half-open, admitting probe");
        Ok(Permit {
            generation: inner.generation,
            probe: true,
        })
    }

    fn on_success(&self, permit: Permit) {
        let mut inner = self.lock();
        if inner.generation != permit.generation {
            return;
        }
        let state = inner.state;
        match state {
            BreakerState::HalfOpen { .. } => {
                inner.transition(BreakerState::Closed { consecutive_failures: 0 });
                tracing::info!(breaker = %self.name, "Circuit closed after successful probe");
            }
            BreakerState::Closed { consecutive_failures } if consecutive_failures > 0 => {
                inner.state = BreakerState::Closed { consecutive_failures: 0 };
            }
            _ => {}
        }
    }

    fn on_failure(&self, permit: Permit) {
        let mut inner = self.lock();
        if inner.generation != permit.generation {
            return;
        }
        let until = Instant::now() + self.config.reset_interval;
        let state = inner.state;
        match state {
            BreakerState::HalfOpen { .. } if permit.probe => {
                inner.transition(BreakerState::Open { until });
                tracing::warn!(breaker = %self.name, "Probe failed, circuit re-opened");
            }
            BreakerState::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    inner.transition(BreakerState::Open { until });
                    tracing::warn!(
                        breaker = %self.name,
                        failures,
                        reset_ms = self.config.reset_interval.as_millis() as u64,
                        "Circuit opened"
                    );
                } else {
                    inner.state = BreakerState::Closed { consecutive_failures: failures };
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_interval: Duration::from_secs(5),
                call_timeout: Duration::from_secs(3),
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        cb.call(|| async { Err::<(), _>("boom") }).await
    }

    #[tokio::test]
    async fn test_starts_closed() {
        assert_eq!(breaker(3).state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let cb = breaker(1);
        let result = cb
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, &str>(())
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Timeout(_))));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let cb = breaker(1);
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(fail(&cb).await, Err(CircuitBreakerError::Open(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
