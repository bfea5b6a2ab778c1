//! Free-text duration grammar for the wizard's length stage
//!
//! Accepts strings like "30m", "1d12h", "2w", "1h30m15s" and the word
//! "permanent" (or "perm"/"forever"/"never") for a non-expiring punishment.

use chrono::Duration;

use crate::moderation::{ModerationError, ModerationResult};

/// Outcome of parsing a length string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedLength {
    /// Punishment never expires
    Permanent,
    /// Punishment expires after this positive span
    After(Duration),
}

/// Parse a free-text length string.
///
/// # Errors
/// Returns a validation error for empty input, unknown units, or a span
/// that works out to zero.
pub fn parse_length(input: &str) -> ModerationResult<ParsedLength> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return Err(ModerationError::Validation(
            "Enter a duration like `30m`, `1d12h`, or `permanent`".to_string(),
        ));
    }

    if matches!(input.as_str(), "permanent" | "perm" | "forever" | "never") {
        return Ok(ParsedLength::Permanent);
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    for ch in input.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if ch.is_whitespace() && digits.is_empty() {
            continue;
        } else {
            let value: i64 = digits.parse().map_err(|_| {
                ModerationError::Validation(format!("Expected a number before `{ch}`"))
            })?;
            digits.clear();

            let unit = match ch {
                's' => Duration::seconds(1),
                'm' => Duration::minutes(1),
                'h' => Duration::hours(1),
                'd' => Duration::days(1),
                'w' => Duration::weeks(1),
                other => {
                    return Err(ModerationError::Validation(format!(
                        "Unknown duration unit `{other}` (use s, m, h, d, or w)"
                    )));
                }
            };
            total += unit * i32::try_from(value).map_err(|_| {
                ModerationError::Validation("Duration value is too large".to_string())
            })?;
        }
    }

    if !digits.is_empty() {
        // A bare trailing number defaults to minutes
        let value: i64 = digits
            .parse()
            .map_err(|_| ModerationError::Validation("Invalid duration".to_string()))?;
        total += Duration::minutes(value);
    }

    if total <= Duration::zero() {
        return Err(ModerationError::Validation(
            "Duration must be positive".to_string(),
        ));
    }

    Ok(ParsedLength::After(total))
}
