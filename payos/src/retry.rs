//! Retry eligibility and backoff computation.
//!
//! [`should_retry`] is a pure function over an [`ErrorKind`] and optional
//! HTTP status. [`RetryPolicy::backoff`] picks the wait before the next
//! attempt, honoring server hints before falling back to capped exponential
//! backoff with jitter.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use http::{HeaderMap, StatusCode};
use rand::{RngExt, rng};

use crate::error::ErrorKind;

/// Header carrying a delay in seconds or an HTTP date.
pub const RETRY_AFTER: &str = "retry-after";

/// Header carrying the epoch second at which the rate-limit window resets.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Server hints at or above this ceiling are ignored.
pub const MAX_HINT: Duration = Duration::from_secs(60);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Returns `true` if an error of `kind` with `status` may be retried.
///
/// Connection errors, timeouts, and API errors with status 408, 429 or any 5xx
/// are retryable. Everything else, including signature and parse failures and
/// cancellation, is terminal.
#[must_use]
pub fn should_retry(kind: ErrorKind, status: Option<StatusCode>) -> bool {
    match kind {
        ErrorKind::Connection | ErrorKind::Timeout => true,
        ErrorKind::Api(_) => status.is_some_and(is_retryable_status),
        _ => false,
    }
}

/// Returns `true` for 408, 429 and any 5xx.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Attempt budget and exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` and default delays.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Sets the number of retries after the first attempt. `0` disables retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on exponential backoff.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts: `max_retries + 1`.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retrying after the failed attempt `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32, headers: Option<&HeaderMap>) -> Duration {
        let jitter = rng().random_range(0.75..=1.0);
        self.backoff_at(attempt, headers, SystemTime::now(), jitter)
    }

    /// Deterministic form of [`Self::backoff`] with explicit clock and jitter.
    ///
    /// Precedence: `Retry-After`, then `X-RateLimit-Reset`, then
    /// `min(initial * 2^attempt, max) * jitter`. A hint is used only if it
    /// resolves to a positive duration under [`MAX_HINT`].
    #[must_use]
    pub fn backoff_at(
        &self,
        attempt: u32,
        headers: Option<&HeaderMap>,
        now: SystemTime,
        jitter: f64,
    ) -> Duration {
        if let Some(hint) = headers.and_then(|h| server_hint(h, now)) {
            return hint;
        }
        let exponent = i32::try_from(attempt.min(62)).unwrap_or(62);
        let base = self.initial_delay.as_secs_f64() * 2f64.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped * jitter.clamp(0.0, 1.0)).unwrap_or(self.max_delay)
    }
}

/// Extracts a usable server-supplied delay from response headers.
#[must_use]
pub fn server_hint(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    header(RETRY_AFTER)
        .and_then(|v| parse_retry_after(v, now))
        .or_else(|| header(RATE_LIMIT_RESET).and_then(|v| parse_rate_limit_reset(v, now)))
}

/// Parses `Retry-After` as fractional seconds or an HTTP date.
#[must_use]
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<f64>() {
        return accept_seconds(seconds);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = u64::try_from(at.timestamp_millis()).ok()?;
    let at = UNIX_EPOCH.checked_add(Duration::from_millis(millis))?;
    accept(at.duration_since(now).ok()?)
}

/// Parses `X-RateLimit-Reset` as an epoch timestamp in seconds.
#[must_use]
pub fn parse_rate_limit_reset(value: &str, now: SystemTime) -> Option<Duration> {
    let epoch = value.parse::<f64>().ok()?;
    if !epoch.is_finite() || epoch <= 0.0 {
        return None;
    }
    let at = UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(epoch.trunc()).ok()?)?;
    accept(at.duration_since(now).ok()?)
}

fn accept_seconds(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    accept(Duration::try_from_secs_f64(seconds).ok()?)
}

fn accept(delay: Duration) -> Option<Duration> {
    (!delay.is_zero() && delay < MAX_HINT).then_some(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_should_retry_table() {
        let api = ErrorKind::Api(ApiErrorKind::Other);
        assert!(should_retry(ErrorKind::Connection, None));
        assert!(should_retry(ErrorKind::Timeout, None));
        assert!(should_retry(api, Some(StatusCode::REQUEST_TIMEOUT)));
        assert!(should_retry(
            ErrorKind::Api(ApiErrorKind::TooManyRequests),
            Some(StatusCode::TOO_MANY_REQUESTS)
        ));
        assert!(should_retry(
            ErrorKind::Api(ApiErrorKind::InternalServer),
            Some(StatusCode::SERVICE_UNAVAILABLE)
        ));

        assert!(!should_retry(
            ErrorKind::Api(ApiErrorKind::BadRequest),
            Some(StatusCode::BAD_REQUEST)
        ));
        assert!(!should_retry(api, Some(StatusCode::OK)));
        assert!(!should_retry(ErrorKind::InvalidSignature, None));
        assert!(!should_retry(ErrorKind::Parse, None));
        assert!(!should_retry(ErrorKind::Cancelled, None));
        assert!(!should_retry(ErrorKind::Configuration, None));
    }

    #[test]
    fn test_retry_after_seconds_wins_regardless_of_attempt() {
        let policy = RetryPolicy::default();
        let h = headers(&[("retry-after", "3")]);
        for attempt in [0, 1, 5] {
            assert_eq!(
                policy.backoff_at(attempt, Some(&h), at(1_000), 0.8),
                Duration::from_secs(3)
            );
        }
    }

    #[test]
    fn test_retry_after_fractional_and_out_of_range() {
        let now = at(1_000);
        assert_eq!(
            parse_retry_after("0.25", now),
            Some(Duration::from_millis(250))
        );
        assert_eq!(parse_retry_after("0", now), None);
        assert_eq!(parse_retry_after("-1", now), None);
        assert_eq!(parse_retry_after("60", now), None);
        assert_eq!(parse_retry_after("garbage", now), None);
    }

    #[test]
    fn test_retry_after_http_date() {
        // Wed, 21 Oct 2015 07:28:00 GMT
        let target = 1_445_412_480;
        let h = "Wed, 21 Oct 2015 07:28:00 GMT";
        assert_eq!(
            parse_retry_after(h, at(target - 5)),
            Some(Duration::from_secs(5))
        );
        assert_eq!(parse_retry_after(h, at(target + 5)), None);
        assert_eq!(parse_retry_after(h, at(target - 120)), None);
    }

    #[test]
    fn test_rate_limit_reset_used_when_retry_after_absent() {
        let policy = RetryPolicy::default();
        let h = headers(&[("x-ratelimit-reset", "1010")]);
        assert_eq!(
            policy.backoff_at(0, Some(&h), at(1_000), 1.0),
            Duration::from_secs(10)
        );

        let invalid_retry_after = headers(&[("retry-after", "nope"), ("x-ratelimit-reset", "1002")]);
        assert_eq!(
            policy.backoff_at(0, Some(&invalid_retry_after), at(1_000), 1.0),
            Duration::from_secs(2)
        );

        let stale = headers(&[("x-ratelimit-reset", "900")]);
        assert_eq!(
            policy.backoff_at(0, Some(&stale), at(1_000), 1.0),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_exponential_backoff_bounds() {
        let policy = RetryPolicy::default();
        let now = at(0);
        let low = policy.backoff_at(0, None, now, 0.75);
        let high = policy.backoff_at(0, None, now, 1.0);
        assert_eq!(low, Duration::from_millis(375));
        assert_eq!(high, Duration::from_millis(500));

        for _ in 0..50 {
            let d = policy.backoff(0, None);
            assert!(d >= Duration::from_millis(375) && d <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_exponential_backoff_non_decreasing_and_capped() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let d = policy.backoff_at(attempt, None, at(0), 1.0);
            assert!(d >= previous);
            assert!(d <= Duration::from_secs(10));
            previous = d;
        }
        assert_eq!(previous, Duration::from_secs(10));
    }

    #[test]
    fn test_huge_max_delay_does_not_overflow() {
        let policy = RetryPolicy::new(1)
            .with_initial_delay(Duration::MAX)
            .with_max_delay(Duration::MAX);
        assert_eq!(policy.backoff_at(62, None, at(0), 1.0), Duration::MAX);
    }

    #[test]
    fn test_attempt_budget() {
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(u32::MAX).max_attempts(), u32::MAX);
    }
}
