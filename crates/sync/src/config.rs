//! Engine configuration.

use std::time::Duration;

/// Default quiet period for the debounced cart write-back, in milliseconds.
///
/// Long enough to coalesce a burst of +/- clicks into one request, short
/// enough that the server copy is never far behind the screen.
const DEFAULT_QUIET_PERIOD_MS: u64 = 800;

/// Tunables for the synchronization engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last cart mutation before the write-back fires.
    pub quiet_period: Duration,
}

impl SyncConfig {
    /// Configuration with a custom quiet period.
    #[must_use]
    pub const fn with_quiet_period(quiet_period: Duration) -> Self {
        Self { quiet_period }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quiet_period() {
        assert_eq!(SyncConfig::default().quiet_period, Duration::from_millis(800));
    }

    #[test]
    fn test_with_quiet_period() {
        let config = SyncConfig::with_quiet_period(Duration::from_millis(100));
        assert_eq!(config.quiet_period, Duration::from_millis(100));
    }
}
