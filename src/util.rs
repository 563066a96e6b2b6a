//! Utility functions used by the load test.

use regex::Regex;
use std::str::FromStr;

/// Parse a string representing a time span and return the number of seconds.
///
/// Can be specified as an integer, indicating seconds. Or can use integers
/// together with one or more of "h", "m", and "s", in that order, indicating
/// "hours", "minutes", and "seconds".
///
/// Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc. Anything that
/// can't be parsed in full, or that overflows, is 0 seconds.
///
/// # Example
/// ```rust
/// use gosling::util;
///
/// // 1 hour 2 minutes and 3 seconds is 3,723 seconds.
/// assert_eq!(util::parse_timespan("1h2m3s"), 3_723);
///
/// // 45 seconds is 45 seconds.
/// assert_eq!(util::parse_timespan("45"), 45);
///
/// // Invalid value is 0 seconds.
/// assert_eq!(util::parse_timespan("foo"), 0);
///
/// // Units other than h, m and s are invalid.
/// assert_eq!(util::parse_timespan("500ms"), 0);
/// ```
pub fn parse_timespan(time_str: &str) -> usize {
    match usize::from_str(time_str) {
        // If an integer is passed in, assume it's seconds
        Ok(t) => {
            trace!("{} is integer: {} seconds", time_str, t);
            t
        }
        // Otherwise use a regex to extract hours, minutes and seconds from string.
        Err(_) => {
            let re = match Regex::new(
                r"^((?P<hours>\d+)h)?((?P<minutes>\d+)m)?((?P<seconds>\d+)s)?$",
            ) {
                Ok(re) => re,
                Err(e) => {
                    warn!("failed to compile timespan regex: {}", e);
                    return 0;
                }
            };
            // The whole string must be a timespan, "500ms" or "1m30" are not.
            let time_matches = match re.captures(time_str) {
                Some(captures) => captures,
                None => return 0,
            };
            let capture = |name: &str| -> Option<usize> {
                match time_matches.name(name) {
                    Some(m) => usize::from_str(m.as_str()).ok(),
                    None => Some(0),
                }
            };
            let (hours, minutes, seconds) =
                match (capture("hours"), capture("minutes"), capture("seconds")) {
                    (Some(h), Some(m), Some(s)) => (h, m, s),
                    _ => return 0,
                };
            let total = match hours
                .checked_mul(60 * 60)
                .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
                .and_then(|hm| hm.checked_add(seconds))
            {
                Some(total) => total,
                None => {
                    debug!("timespan {} overflows", time_str);
                    return 0;
                }
            };
            trace!(
                "{} hours {} minutes {} seconds: {} seconds",
                hours,
                minutes,
                seconds,
                total
            );
            total
        }
    }
}
