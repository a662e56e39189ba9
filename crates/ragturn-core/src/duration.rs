use regex::Regex;

use crate::error::ChatError;

/// Default chat session TTL when none is configured.
pub const DEFAULT_CHAT_EXPIRE: &str = "1h";

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;
const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

/// Parse a human duration string (`"1h"`, `"2d"`, `"1w"`, `"1m"`, `"1y"`)
/// into seconds. An empty or missing input falls back to [`DEFAULT_CHAT_EXPIRE`].
///
/// Units: h=hours, d=days, w=weeks, m=30-day months, y=365-day years.
pub fn parse_duration_secs(input: &str) -> Result<u64, ChatError> {
    let input = if input.is_empty() {
        DEFAULT_CHAT_EXPIRE
    } else {
        input
    };

    let re = Regex::new(r"^(\d+)([hdwmy])$").expect("static regex is valid");
    let lower = input.to_lowercase();
    let captures = re
        .captures(&lower)
        .ok_or_else(|| ChatError::InvalidInput(format!("malformed duration: {input}")))?;

    let amount: u64 = captures[1]
        .parse()
        .map_err(|_| ChatError::InvalidInput(format!("malformed duration: {input}")))?;

    let unit_secs = match &captures[2] {
        "h" => SECS_PER_HOUR,
        "d" => SECS_PER_DAY,
        "w" => SECS_PER_WEEK,
        "m" => SECS_PER_MONTH,
        "y" => SECS_PER_YEAR,
        _ => unreachable!("regex only matches [hdwmy]"),
    };

    Ok(amount * unit_secs)
}
