//! Calendar views of the injected [`tick::Clock`].
//!
//! Every wait in the pipeline (retry backoff, rate-limit pauses) and every read of
//! the current time goes through one `tick::Clock`, so tests can drive time with a
//! controlled clock instead of sleeping.

use chrono::{DateTime, NaiveDate, Utc};
use tick::Clock;

/// The current instant of `clock` in UTC.
#[must_use]
pub fn now(clock: &Clock) -> DateTime<Utc> {
    DateTime::<Utc>::from(clock.system_time())
}

/// The current calendar day (UTC), used as the partition key of new records.
#[must_use]
pub fn today(clock: &Clock) -> NaiveDate {
    now(clock).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tick::ClockControl;

    #[tokio::test]
    async fn controlled_clock_moves_on_delay() {
        let clock = ClockControl::new().auto_advance_timers(true).to_clock();
        let before = now(&clock);

        clock.delay(Duration::from_secs(90)).await;

        assert!(now(&clock) >= before + chrono::Duration::seconds(90));
    }

    #[test]
    fn today_is_utc_date_of_now() {
        let clock = ClockControl::new().to_clock();
        assert_eq!(today(&clock), now(&clock).date_naive());
    }
}
