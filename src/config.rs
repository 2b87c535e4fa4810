use std::time::Duration;

/// Time for the display to report its power status after the first wake-up.
pub const OTP_TIMEOUT_MS: u64 = 4000;
/// Standard response timeout, used between retries.
pub const TIMEOUT_MS: u64 = 2000;
/// How often `<Give Device Power Status>` is repeated before giving up.
pub const LOOP_COUNTER_MAX: u32 = 3;

/**
 * Timing of [OneTouchPlayAction](crate::OneTouchPlayAction).
 *
 * ```
 * # use cec_otp::OneTouchPlayConfig;
 * let config = OneTouchPlayConfig::default().with_max_retries(5);
 * assert_eq!(config.initial_timeout().as_millis(), 4000);
 * ```
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OneTouchPlayConfig {
    pub initial_timeout_ms: u64,
    pub retry_timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for OneTouchPlayConfig {
    fn default() -> Self {
        Self {
            initial_timeout_ms: OTP_TIMEOUT_MS,
            retry_timeout_ms: TIMEOUT_MS,
            max_retries: LOOP_COUNTER_MAX,
        }
    }
}

impl OneTouchPlayConfig {
    #[inline]
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_timeout_ms)
    }
    #[inline]
    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }
    pub fn with_initial_timeout(mut self, timeout: Duration) -> Self {
        self.initial_timeout_ms = timeout.as_millis() as u64;
        self
    }
    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout_ms = timeout.as_millis() as u64;
        self
    }
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
    /// Longest time an action can stay in flight without an answer.
    pub fn worst_case(&self) -> Duration {
        self.initial_timeout() + self.retry_timeout() * self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = OneTouchPlayConfig::default();
        assert_eq!(c.initial_timeout(), Duration::from_secs(4));
        assert_eq!(c.retry_timeout(), Duration::from_secs(2));
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.worst_case(), Duration::from_secs(10));
    }

    #[test]
    fn builders() {
        let c = OneTouchPlayConfig::default()
            .with_initial_timeout(Duration::from_millis(100))
            .with_retry_timeout(Duration::from_millis(50))
            .with_max_retries(0);
        assert_eq!(c.initial_timeout_ms, 100);
        assert_eq!(c.retry_timeout_ms, 50);
        assert_eq!(c.worst_case(), Duration::from_millis(100));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_keeps_defaults() {
        let c: OneTouchPlayConfig = serde_json::from_str(r#"{"max_retries": 1}"#).unwrap();
        assert_eq!(c.max_retries, 1);
        assert_eq!(c.initial_timeout_ms, OTP_TIMEOUT_MS);
    }
}
