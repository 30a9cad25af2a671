use parking_lot::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests fail fast
    Open,
    /// Probing whether the dependency recovered
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError {
    #[error("circuit breaker is open")]
    Open,

    #[error(transparent)]
    Inner(#[from] anyhow::Error),
}

struct Inner {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    last_failure: Option<Instant>,
}

/// Circuit breaker guarding calls to an external dependency.
///
/// Closed counts consecutive failures and opens at the threshold. Open
/// fails fast until the cooldown elapses, then admits one probe call in
/// HalfOpen; enough consecutive probe successes close it again, any probe
/// failure reopens it.
pub struct CircuitBreaker {
    failure_threshold: usize,
    success_threshold: usize,
    cooldown: Duration,
    inner: RwLock<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, success_threshold: usize, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            cooldown,
            inner: RwLock::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Run `f` through the breaker.
    pub async fn call<F, T>(&self, f: F) -> Result<T, BreakerError>
    where
        F: std::future::Future<Output = anyhow::Result<T>>,
    {
        self.admit()?;

        match f.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn admit(&self) -> Result<(), BreakerError> {
        let mut inner = self.inner.write();

        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .last_failure
                .map(|at| at.elapsed() >= self.cooldown)
                .unwrap_or(true);

            if !cooled_down {
                return Err(BreakerError::Open);
            }

            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            tracing::debug!("circuit breaker half-open, probing dependency");
        }

        Ok(())
    }

    fn on_success(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    tracing::info!("circuit breaker closed");
                }
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_failure = Some(Instant::now());
                tracing::warn!("circuit breaker reopened after failed probe");
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_failure = Some(Instant::now());
                    tracing::warn!(
                        failures = inner.failure_count,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, 2, Duration::from_millis(20))
    }

    async fn fail(cb: &CircuitBreaker) {
        let _ = cb.call(async { Err::<(), _>(anyhow::anyhow!("boom")) }).await;
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<u32, BreakerError> {
        cb.call(async { Ok(42) }).await
    }

    #[tokio::test]
    async fn stays_closed_on_success() {
        let cb = breaker();
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Fails fast without running the future
        let result = succeed(&cb).await;
        assert!(matches!(result, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn recovers_through_half_open() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Two probe successes close the circuit
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn failed_probe_reopens() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn intermittent_failures_do_not_open() {
        let cb = breaker();
        fail(&cb).await;
        fail(&cb).await;
        assert!(succeed(&cb).await.is_ok());
        fail(&cb).await;
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
