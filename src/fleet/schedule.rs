use crate::error::UnrecognizedScheduleError;

/// Schedule tokens the execution engine accepts for periodic triggering.
pub const CANONICAL_SCHEDULES: &[&str] = &[
    "never",
    "every_1_minute",
    "every_2_minutes",
    "every_5_minutes",
    "every_10_minutes",
    "every_30_minutes",
    "every_1_hour",
    "every_2_hours",
    "every_5_hours",
    "every_12_hours",
    "every_1_day",
    "every_2_days",
    "every_7_days",
];

/// Shorthand tokens left behind by older provisioning runs, mapped to the
/// canonical value the engine expects.
///
/// `every_3m` has no exact canonical counterpart; it maps down to
/// `every_2_minutes` so a repaired worker never runs less often than asked.
pub const LEGACY_SCHEDULES: &[(&str, &str)] = &[
    ("every_1m", "every_1_minute"),
    ("every_1_minutes", "every_1_minute"),
    ("every_2m", "every_2_minutes"),
    ("every_3m", "every_2_minutes"),
    ("every_5m", "every_5_minutes"),
    ("every_10m", "every_10_minutes"),
    ("every_30m", "every_30_minutes"),
    ("every_1h", "every_1_hour"),
    ("every_1_hours", "every_1_hour"),
    ("every_2h", "every_2_hours"),
    ("every_5h", "every_5_hours"),
    ("every_12h", "every_12_hours"),
    ("every_1d", "every_1_day"),
    ("every_1_days", "every_1_day"),
    ("every_2d", "every_2_days"),
    ("every_7d", "every_7_days"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub canonical: &'static str,
    /// `true` when the input was a legacy token (or differed in case or
    /// surrounding whitespace) and had to be rewritten.
    pub changed: bool,
}

pub fn normalize(raw: &str) -> Result<Normalized, UnrecognizedScheduleError> {
    let token = raw.trim().to_ascii_lowercase();

    if let Some(canonical) = CANONICAL_SCHEDULES.iter().copied().find(|c| *c == token) {
        return Ok(Normalized {
            canonical,
            changed: canonical != raw,
        });
    }

    if let Some((_, canonical)) = LEGACY_SCHEDULES
        .iter()
        .copied()
        .find(|(legacy, _)| *legacy == token)
    {
        return Ok(Normalized {
            canonical,
            changed: true,
        });
    }

    Err(UnrecognizedScheduleError {
        token: raw.to_string(),
    })
}

pub fn is_canonical(raw: &str) -> bool {
    CANONICAL_SCHEDULES.contains(&raw)
}
