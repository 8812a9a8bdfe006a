//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get the current wall-clock time (UTC)
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock from a Unix timestamp in milliseconds
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_millis(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: DateTime::from_timestamp_millis(fixed_time_millis).unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Format a timestamp the way the wire protocol expects (RFC 3339, millisecond precision)
pub fn to_rfc3339_millis(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_increasing_timestamps() {
        // テスト項目: SystemClock が呼び出すたびに増加するタイムスタンプを返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let timestamp1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let timestamp2 = clock.now();

        // then (期待する結果):
        assert!(timestamp2 >= timestamp1);
    }

    #[test]
    fn test_fixed_clock_returns_consistent_timestamp() {
        // テスト項目: FixedClock が複数回呼び出しても同じタイムスタンプを返す
        // given (前提条件):
        let clock = FixedClock::from_millis(1_672_531_200_000);

        // when (操作):
        let timestamp1 = clock.now();
        let timestamp2 = clock.now();

        // then (期待する結果):
        assert_eq!(timestamp1, timestamp2);
        assert_eq!(timestamp1.timestamp_millis(), 1_672_531_200_000);
    }

    #[test]
    fn test_to_rfc3339_millis_format() {
        // テスト項目: タイムスタンプがミリ秒精度の RFC 3339 (UTC) 形式に変換される
        // given (前提条件):
        // 2023-01-01 00:00:00.123 UTC
        let clock = FixedClock::from_millis(1_672_531_200_123);

        // when (操作):
        let result = to_rfc3339_millis(clock.now());

        // then (期待する結果):
        assert_eq!(result, "2023-01-01T00:00:00.123Z");
    }
}
