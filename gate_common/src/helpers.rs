use std::{str::FromStr, time::Duration};

use log::warn;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a number from an (optional) environment value. Missing values silently fall back to `default`; values that
/// do not parse fall back to `default` with a warning that names the variable.
pub fn parse_number<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match value {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e}. Using the default instead.");
            default
        }),
    }
}

/// Parse a duration given in milliseconds. Zero is treated as invalid, since none of the durations we configure make
/// sense when empty.
pub fn parse_duration_millis(name: &str, value: Option<String>, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    match parse_number::<u64>(name, value, default_ms) {
        0 => {
            warn!("🪛️ {name} cannot be zero. Using the default of {default_ms}ms instead.");
            default
        },
        ms => Duration::from_millis(ms),
    }
}
