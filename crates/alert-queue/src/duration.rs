//! Display timing constants and the duration setting parser.

use std::time::Duration;

/// Display time used when no valid override is configured.
pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_millis(5000);

/// Pause after acknowledgement so the overlay can run its exit transition.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Resolve a duration override given in seconds. Fractions are kept to
/// the millisecond.
///
/// Absent, empty, non-numeric and values under one millisecond fall back
/// to [`DEFAULT_DISPLAY_DURATION`].
pub fn display_duration(setting: Option<&str>) -> Duration {
    setting
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| secs.is_finite())
        .map(|secs| (secs * 1000.0).round())
        .filter(|&millis| millis >= 1.0)
        // `as` saturates for values beyond u64.
        .map(|millis| Duration::from_millis(millis as u64))
        .unwrap_or(DEFAULT_DISPLAY_DURATION)
}
