//! Call-rate discipline shared by the scanner and the batch processor.
//!
//! Two mechanisms stack: fixed delays (inter-record smoothing, a longer
//! penalty after a failed mutation, a cooldown after a 429 during scanning)
//! and a proactive policy that inspects the rate budget every response
//! advertises and sleeps through the reset when the remaining quota is at or
//! below a low-water mark, so the hard limit is never actually hit.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cms_client::RateBudget;

#[derive(Debug, Clone)]
pub struct Throttle {
    /// Wait for the reset once remaining quota is at or below this.
    pub low_water: u32,
    /// Extra margin added on top of the advertised reset time.
    pub slack: Duration,
    /// Smoothing delay after every processed record.
    pub per_record: Duration,
    /// Penalty delay after a failed mutation; failures are a signal to slow
    /// down independent of the rate-limit headers.
    pub failure_penalty: Duration,
    /// Cooldown before retrying a page fetch the CMS rejected with 429.
    pub page_cooldown: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            low_water: 10,
            slack: Duration::from_millis(500),
            per_record: Duration::from_millis(200),
            failure_penalty: Duration::from_secs(1),
            page_cooldown: Duration::from_secs(5),
        }
    }
}

impl Throttle {
    /// All delays zeroed; keeps tests instant.
    pub fn unthrottled() -> Self {
        Self {
            low_water: 0,
            slack: Duration::ZERO,
            per_record: Duration::ZERO,
            failure_penalty: Duration::ZERO,
            page_cooldown: Duration::ZERO,
        }
    }

    /// How long to wait out the current window, if the budget calls for it.
    ///
    /// `None` when the quota is comfortable, the budget headers were absent,
    /// or the advertised reset is already in the past.
    pub fn backoff_until_reset(&self, budget: &RateBudget, now: SystemTime) -> Option<Duration> {
        let remaining = budget.remaining?;
        if remaining > self.low_water {
            return None;
        }
        let reset = UNIX_EPOCH + Duration::from_secs(budget.reset_epoch?);
        match reset.duration_since(now) {
            Ok(until_reset) => Some(until_reset + self.slack),
            Err(_) => None,
        }
    }

    /// Sleep through the reset when the remaining quota is low.
    pub async fn respect(&self, budget: &RateBudget) {
        if let Some(wait) = self.backoff_until_reset(budget, SystemTime::now()) {
            tracing::info!(
                remaining = budget.remaining,
                wait_secs = wait.as_secs(),
                "rate budget low, waiting for reset"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(remaining: u32, reset_epoch: u64) -> RateBudget {
        RateBudget {
            remaining: Some(remaining),
            reset_epoch: Some(reset_epoch),
        }
    }

    #[test]
    fn comfortable_quota_needs_no_wait() {
        let throttle = Throttle::default();
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(throttle.backoff_until_reset(&budget(50, 1_060), now), None);
    }

    #[test]
    fn low_quota_waits_until_reset_plus_slack() {
        let throttle = Throttle::default();
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        // remaining 5 is at or below the default low-water mark of 10
        let wait = throttle
            .backoff_until_reset(&budget(5, 1_060), now)
            .expect("must wait");
        assert_eq!(wait, Duration::from_secs(60) + throttle.slack);
    }

    #[test]
    fn quota_exactly_at_low_water_still_waits() {
        let throttle = Throttle::default();
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert!(throttle.backoff_until_reset(&budget(10, 1_030), now).is_some());
    }

    #[test]
    fn past_reset_means_no_wait() {
        let throttle = Throttle::default();
        let now = UNIX_EPOCH + Duration::from_secs(2_000);
        assert_eq!(throttle.backoff_until_reset(&budget(0, 1_000), now), None);
    }

    #[test]
    fn absent_headers_mean_no_wait() {
        let throttle = Throttle::default();
        assert_eq!(
            throttle.backoff_until_reset(&RateBudget::default(), SystemTime::now()),
            None
        );
    }
}
