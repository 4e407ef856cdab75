//! Token TTL configuration parsing.

use std::time::Duration;

use tracing::warn;

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Parse a duration string with a unit suffix (`s`, `m`, `h`, `d`).
///
/// All TTL configuration goes through this single parser. Input that does
/// not match `<number><unit>` falls back to `default` instead of failing
/// startup.
pub fn parse_ttl(input: &str, default: Duration) -> Duration {
    let input = input.trim();

    let Some(unit) = input.chars().last() else {
        warn!(input = %input, "Empty TTL, using default");
        return default;
    };

    let value = &input[..input.len() - unit.len_utf8()];
    let Ok(value) = value.parse::<u64>() else {
        warn!(input = %input, "Unparseable TTL, using default");
        return default;
    };

    let seconds = match unit {
        's' => value,
        'm' => value * 60,
        'h' => value * 3600,
        'd' => value * 86400,
        _ => {
            warn!(input = %input, "Unknown TTL unit, using default");
            return default;
        }
    };

    Duration::from_secs(seconds)
}
