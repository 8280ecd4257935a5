use std::future::Future;
use std::sync::OnceLock;
use tokio::time::{sleep, sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

// Used when a timeout is too large to be represented as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A single deadline shared by every suspension point in a drain.
///
/// The deadline expires either when its time runs out or when its cancellation token is cancelled, whichever
/// happens first. Cancellation is indistinguishable from the timeout elapsing.
///
/// Cleanup which has to happen after expiry (such as deleting Pods which could not be evicted) shares a single
/// overrun window, see [`Deadline::overrun_remaining`].
#[derive(Clone, Debug)]
pub struct Deadline {
    expires_at: Instant,
    cancellation: CancellationToken,
    overrun: Duration,
    // The moment the overrun window opened. Set once, by the first caller to see the deadline expired.
    overrun_started: OnceLock<Instant>,
}

impl Deadline {
    /// Starts a deadline which expires `timeout` from now, or as soon as `cancellation` is cancelled. Work may run
    /// at most `overrun` past expiry.
    pub fn after(timeout: Duration, overrun: Duration, cancellation: CancellationToken) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        Deadline {
            expires_at,
            cancellation,
            overrun,
            overrun_started: OnceLock::new(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cancellation.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// The time left before the deadline expires.
    pub fn remaining(&self) -> Duration {
        if self.cancellation.is_cancelled() {
            Duration::ZERO
        } else {
            self.expires_at.saturating_duration_since(Instant::now())
        }
    }

    /// The time left for work which is allowed to continue past the deadline. Before expiry this is the time
    /// remaining plus the overrun. Afterwards, every caller draws on the same window, which opened when the
    /// deadline expired (or, after cancellation, when expiry was first noticed).
    pub fn overrun_remaining(&self) -> Duration {
        if !self.is_expired() {
            return self.remaining() + self.overrun;
        }

        let started = *self
            .overrun_started
            .get_or_init(|| Instant::now().min(self.expires_at));
        (started + self.overrun).saturating_duration_since(Instant::now())
    }

    /// Runs `future` until it completes or the deadline expires, returning `None` in the latter case.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            output = future => Some(output),
            _ = sleep_until(self.expires_at) => None,
            _ = self.cancellation.cancelled() => None,
        }
    }

    /// Sleeps for `duration`, waking early if the deadline expires first.
    pub async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = sleep(duration) => {}
            _ = sleep_until(self.expires_at) => {}
            _ = self.cancellation.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadline(timeout: Duration, cancellation: CancellationToken) -> Deadline {
        Deadline::after(timeout, Duration::from_millis(500), cancellation)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_wakes_at_deadline() {
        let start = Instant::now();
        let deadline = deadline(Duration::from_secs(3), CancellationToken::new());

        deadline.sleep(Duration::from_secs(2)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::from_secs(1));

        deadline.sleep(Duration::from_secs(60)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_expires_deadline() {
        let cancellation = CancellationToken::new();
        let deadline = deadline(Duration::from_secs(600), cancellation.clone());
        assert!(!deadline.is_expired());

        let start = Instant::now();
        let canceller = cancellation.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        deadline.sleep(Duration::from_secs(60)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_is_expired_immediately() {
        let deadline = deadline(Duration::ZERO, CancellationToken::new());
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_deadline() {
        let deadline = deadline(Duration::from_secs(3), CancellationToken::new());

        assert_eq!(deadline.run(async { 7 }).await, Some(7));

        let start = Instant::now();
        let stalled = deadline.run(sleep(Duration::from_secs(3600))).await;
        assert_eq!(stalled, None);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancellation() {
        let cancellation = CancellationToken::new();
        let deadline = deadline(Duration::from_secs(600), cancellation.clone());

        let canceller = cancellation.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        assert_eq!(deadline.run(sleep(Duration::from_secs(60))).await, None);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_window_is_shared() {
        let deadline = deadline(Duration::from_secs(3), CancellationToken::new());
        assert_eq!(deadline.overrun_remaining(), Duration::from_millis(3500));

        sleep(Duration::from_secs(3)).await;
        assert_eq!(deadline.overrun_remaining(), Duration::from_millis(500));

        sleep(Duration::from_millis(300)).await;
        assert_eq!(deadline.overrun_remaining(), Duration::from_millis(200));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(deadline.overrun_remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_window_opens_when_cancellation_is_noticed() {
        let cancellation = CancellationToken::new();
        let deadline = deadline(Duration::from_secs(600), cancellation.clone());

        sleep(Duration::from_secs(10)).await;
        cancellation.cancel();
        assert_eq!(deadline.overrun_remaining(), Duration::from_millis(500));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(deadline.overrun_remaining(), Duration::ZERO);
    }
}
