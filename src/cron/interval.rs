/// Longest supported watch interval, in seconds.
pub const MAX_WATCH_SECONDS: u32 = 5;

/// Converts a watch interval such as `"3s"` or `"3"` into a six-field cron
/// expression firing every N seconds.
///
/// Intervals above five seconds are clamped to five; anything unparsable
/// falls back to five. Both cases log a warning.
pub fn interval_to_cron(interval: &str) -> String {
    let trimmed = interval.trim();
    let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);

    let seconds = match digits.parse::<u32>() {
        Ok(n) if (1..=MAX_WATCH_SECONDS).contains(&n) => n,
        Ok(n) if n > MAX_WATCH_SECONDS => {
            tracing::warn!(interval = %interval, "Interval exceeds 5 seconds. Falling back to 5 seconds.");
            MAX_WATCH_SECONDS
        }
        _ => {
            tracing::warn!(interval = %interval, "Invalid interval format. Defaulting to 5 seconds.");
            MAX_WATCH_SECONDS
        }
    };

    format!("*/{} * * * * *", seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_intervals() {
        assert_eq!(interval_to_cron("1s"), "*/1 * * * * *");
        assert_eq!(interval_to_cron("3"), "*/3 * * * * *");
        assert_eq!(interval_to_cron(" 5s "), "*/5 * * * * *");
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(interval_to_cron("10s"), "*/5 * * * * *");
        assert_eq!(interval_to_cron("0s"), "*/5 * * * * *");
        assert_eq!(interval_to_cron("5m"), "*/5 * * * * *");
        assert_eq!(interval_to_cron(""), "*/5 * * * * *");
        assert_eq!(interval_to_cron("-2s"), "*/5 * * * * *");
    }

    proptest! {
        #[test]
        fn prop_output_is_bounded(input in ".{0,8}") {
            let cron = interval_to_cron(&input);
            let n: u32 = cron
                .trim_start_matches("*/")
                .split(' ')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap();
            prop_assert!((1..=MAX_WATCH_SECONDS).contains(&n));
        }

        #[test]
        fn prop_in_range_is_kept(n in 1u32..=5, suffix in prop::bool::ANY) {
            let input = if suffix { format!("{n}s") } else { n.to_string() };
            prop_assert_eq!(interval_to_cron(&input), format!("*/{n} * * * * *"));
        }
    }
}
