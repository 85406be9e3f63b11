//! Small shared helpers: LED colour presets and the fatal-panic wrapper
//! used to run background worker threads.

use std::panic::{self, AssertUnwindSafe};

/// A named `(red, green)` LED colour, from least to most alarming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LedColorPreset {
    Off,
    Normal,
    Warning,
    Critical,
}

impl LedColorPreset {
    pub fn rgb(self) -> (u8, u8) {
        match self {
            LedColorPreset::Off => (0, 0),
            LedColorPreset::Normal => (0, 100),
            LedColorPreset::Warning => (50, 100),
            LedColorPreset::Critical => (100, 0),
        }
    }
}

/// Returns the most alarming preset in `presets`, or `Off` if empty.
pub fn most_critical(presets: impl IntoIterator<Item = LedColorPreset>) -> LedColorPreset {
    presets.into_iter().max().unwrap_or(LedColorPreset::Off)
}

/// Normal below `warn`, warning up to `crit`, critical above. For metrics
/// where higher is worse (latency, packet loss, power draw).
pub fn led_upper_threshold(val: f64, warn: f64, crit: f64) -> LedColorPreset {
    if val <= warn {
        LedColorPreset::Normal
    } else if val <= crit {
        LedColorPreset::Warning
    } else {
        LedColorPreset::Critical
    }
}

/// Normal above `warn`, warning down to `crit`, critical below. For
/// metrics where lower is worse (signal strength, battery runtime).
pub fn led_lower_threshold(val: f64, warn: f64, crit: f64) -> LedColorPreset {
    if val >= warn {
        LedColorPreset::Normal
    } else if val >= crit {
        LedColorPreset::Warning
    } else {
        LedColorPreset::Critical
    }
}

/// Runs `f` on the current thread; if it panics, logs the panic and
/// terminates the process immediately. Intended for the top-level closure
/// of every worker thread, so a single bad page or driver cannot leave the
/// process silently half-running.
pub fn critical_call<F: FnOnce() + panic::UnwindSafe>(f: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_owned());
        log::error!("fatal exception in worker thread: {message}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_alarm_severity() {
        assert!(LedColorPreset::Critical > LedColorPreset::Warning);
        assert!(LedColorPreset::Warning > LedColorPreset::Normal);
        assert!(LedColorPreset::Normal > LedColorPreset::Off);
    }

    #[test]
    fn most_critical_picks_the_worst() {
        let presets = [LedColorPreset::Normal, LedColorPreset::Off, LedColorPreset::Warning];
        assert_eq!(most_critical(presets), LedColorPreset::Warning);
    }

    #[test]
    fn most_critical_of_empty_is_off() {
        assert_eq!(most_critical(std::iter::empty()), LedColorPreset::Off);
    }

    #[test]
    fn rgb_values_match_table() {
        assert_eq!(LedColorPreset::Off.rgb(), (0, 0));
        assert_eq!(LedColorPreset::Normal.rgb(), (0, 100));
        assert_eq!(LedColorPreset::Warning.rgb(), (50, 100));
        assert_eq!(LedColorPreset::Critical.rgb(), (100, 0));
    }

    #[test]
    fn upper_threshold_orders_worse_as_higher() {
        assert_eq!(led_upper_threshold(5.0, 10.0, 50.0), LedColorPreset::Normal);
        assert_eq!(led_upper_threshold(30.0, 10.0, 50.0), LedColorPreset::Warning);
        assert_eq!(led_upper_threshold(90.0, 10.0, 50.0), LedColorPreset::Critical);
    }

    #[test]
    fn lower_threshold_orders_worse_as_lower() {
        assert_eq!(led_lower_threshold(-80.0, -90.0, -100.0), LedColorPreset::Normal);
        assert_eq!(led_lower_threshold(-95.0, -90.0, -100.0), LedColorPreset::Warning);
        assert_eq!(led_lower_threshold(-110.0, -90.0, -100.0), LedColorPreset::Critical);
    }
}
