//! Cancellable delay used between workflow steps.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a [`Timer::wait`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Elapsed,
    Cancelled,
}

impl Wait {
    pub fn is_cancelled(self) -> bool {
        self == Wait::Cancelled
    }
}

/// A delay source bound to one workflow run.
///
/// Waiting never blocks the runtime and never fails. Once the run's token is
/// cancelled every pending and future wait resolves to [`Wait::Cancelled`].
#[derive(Debug, Clone)]
pub struct Timer {
    token: CancellationToken,
}

impl Timer {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub async fn wait(&self, duration: Duration) -> Wait {
        if self.token.is_cancelled() {
            return Wait::Cancelled;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Wait::Cancelled,
            _ = tokio::time::sleep(duration) => Wait::Elapsed,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn wait_elapses_after_duration() {
        let timer = Timer::new(CancellationToken::new());
        let started = Instant::now();
        assert_eq!(timer.wait(Duration::from_millis(250)).await, Wait::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_pending_wait() {
        let token = CancellationToken::new();
        let timer = Timer::new(token.clone());

        let pending = tokio::spawn(async move { timer.wait(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        assert_eq!(pending.await.unwrap(), Wait::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_resolves_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let timer = Timer::new(token);
        let started = Instant::now();
        assert!(timer.wait(Duration::from_secs(5)).await.is_cancelled());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
