//! Maps a failed check cycle to a stop/retry decision. Pure: the orchestrator
//! owns sending the user-facing notice and doing the sleeping.

use std::time::Duration;

use crate::github::ApiError;

/// User-facing failure class, resolved to a message template by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    RepoNotFound,
    AuthFailed,
    RateLimited,
    NetworkFailure,
    InvalidData,
    Internal,
}

/// What the orchestrator should do about an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub stop_permanently: bool,
    pub wait: Duration,
    /// Present only when stopping: exactly one notice per fatal stop.
    pub notice: Option<Notice>,
}

impl Directive {
    fn stop(notice: Notice) -> Self {
        Self {
            stop_permanently: true,
            wait: Duration::ZERO,
            notice: Some(notice),
        }
    }

    fn backoff(wait: Duration) -> Self {
        Self {
            stop_permanently: false,
            wait,
            notice: None,
        }
    }
}

fn exponential_wait(attempt: u32, base_interval: Duration) -> Duration {
    let factor = 2_f64.powi(attempt.saturating_sub(1) as i32);
    Duration::from_secs_f64(base_interval.as_secs_f64() * factor)
}

/// Classifies one check-cycle error.
///
/// - 404/401 stop immediately: retrying cannot fix a deleted repository or a
///   rejected credential.
/// - 403 and network/decode failures back off exponentially and stop once
///   `attempt >= max_attempts`; a `Retry-After` header raises the wait to at
///   least `retry_after + 5` seconds.
/// - 5xx statuses behave like network failures; any other status or error
///   type is treated as fatal so an unknown failure mode never spins
///   silently.
pub fn classify(
    error: &anyhow::Error,
    attempt: u32,
    max_attempts: u32,
    base_interval: Duration,
) -> Directive {
    let Some(api_error) = error.downcast_ref::<ApiError>() else {
        return Directive::stop(Notice::Internal);
    };

    match api_error {
        ApiError::NotFound { .. } => Directive::stop(Notice::RepoNotFound),
        ApiError::Unauthorized { .. } => Directive::stop(Notice::AuthFailed),
        ApiError::Forbidden { retry_after, .. } => {
            if attempt >= max_attempts {
                return Directive::stop(Notice::RateLimited);
            }
            let mut wait = exponential_wait(attempt, base_interval);
            if let Some(retry_after) = retry_after {
                wait = wait.max(Duration::from_secs(retry_after + 5));
            }
            Directive::backoff(wait)
        }
        ApiError::Request(_) => transient(attempt, max_attempts, base_interval, Notice::NetworkFailure),
        ApiError::InvalidResponse { .. } => {
            transient(attempt, max_attempts, base_interval, Notice::InvalidData)
        }
        ApiError::Status { status, .. } if (500..600).contains(&(*status as i32)) => {
            transient(attempt, max_attempts, base_interval, Notice::NetworkFailure)
        }
        ApiError::Status { .. } => Directive::stop(Notice::Internal),
    }
}

fn transient(attempt: u32, max_attempts: u32, base_interval: Duration, notice: Notice) -> Directive {
    if attempt >= max_attempts {
        Directive::stop(notice)
    } else {
        Directive::backoff(exponential_wait(attempt, base_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Duration {
        Duration::from_secs(60)
    }

    fn forbidden(retry_after: Option<u64>) -> anyhow::Error {
        anyhow::Error::new(ApiError::Forbidden {
            url: "https://api.github.com/repos/o/r/commits".into(),
            retry_after,
            rate_limit_reset: Some(1_700_000_000),
        })
    }

    fn invalid() -> anyhow::Error {
        anyhow::Error::new(ApiError::InvalidResponse {
            url: "u".into(),
            detail: "not json".into(),
        })
    }

    #[test]
    fn not_found_and_unauthorized_stop_immediately() {
        let err = anyhow::Error::new(ApiError::NotFound { url: "u".into() });
        let d = classify(&err, 1, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::RepoNotFound));

        let err = anyhow::Error::new(ApiError::Unauthorized { url: "u".into() });
        let d = classify(&err, 1, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::AuthFailed));
    }

    #[test]
    fn forbidden_uses_retry_after_floor() {
        // base 60s, attempt 1 → exp wait 60s; Retry-After 120 → 125s wins.
        let d = classify(&forbidden(Some(120)), 1, 5, base());
        assert!(!d.stop_permanently);
        assert_eq!(d.wait, Duration::from_secs(125));
        assert!(d.notice.is_none());
    }

    #[test]
    fn forbidden_without_header_backs_off_exponentially() {
        let d1 = classify(&forbidden(None), 1, 5, base());
        let d2 = classify(&forbidden(None), 2, 5, base());
        let d3 = classify(&forbidden(None), 3, 5, base());
        assert_eq!(d1.wait, Duration::from_secs(60));
        assert_eq!(d2.wait, Duration::from_secs(120));
        assert_eq!(d3.wait, Duration::from_secs(240));
    }

    #[test]
    fn forbidden_exhaustion_stops_with_rate_limit_notice() {
        let d = classify(&forbidden(Some(120)), 5, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::RateLimited));
    }

    #[test]
    fn backoff_growth_is_positive_and_non_decreasing() {
        let mut last = Duration::ZERO;
        for attempt in 1..5 {
            let d = classify(&invalid(), attempt, 5, base());
            assert!(!d.stop_permanently, "attempt {attempt} should retry");
            assert!(d.wait > Duration::ZERO);
            assert!(d.wait >= last);
            last = d.wait;
        }
        let d = classify(&invalid(), 5, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::InvalidData));
    }

    #[test]
    fn server_errors_are_transient_until_exhausted() {
        let err = anyhow::Error::new(ApiError::Status {
            url: "u".into(),
            status: 502,
            body: "bad gateway".into(),
        });
        let d = classify(&err, 1, 5, base());
        assert!(!d.stop_permanently);

        let d = classify(&err, 5, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::NetworkFailure));
    }

    #[test]
    fn unexpected_status_and_foreign_errors_are_fatal() {
        let err = anyhow::Error::new(ApiError::Status {
            url: "u".into(),
            status: 418,
            body: "teapot".into(),
        });
        let d = classify(&err, 1, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::Internal));

        let err = anyhow::anyhow!("some db explosion");
        let d = classify(&err, 1, 5, base());
        assert!(d.stop_permanently);
        assert_eq!(d.notice, Some(Notice::Internal));
    }
}
