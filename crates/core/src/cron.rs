//! Schedule math for the scheduler tick loop.
//!
//! Supports the classic five-field cron grammar (minute, hour, day-of-month,
//! month, day-of-week) with `*`, lists, ranges, and `*/step`, plus simple
//! hour-interval schedules. All computation is in UTC at minute resolution,
//! matching the scheduler's one-minute tick.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::error::CoreError;

/// Upper bound on the next-run search, in days. A valid expression always
/// matches within four years (covers Feb 29 day-of-month schedules).
const SEARCH_HORIZON_DAYS: i64 = 1462;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// One parsed cron field: a 64-bit set over the field's value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
}

impl Field {
    fn contains(self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }

    /// The bit pattern a `*` produces for the given range.
    fn wildcard_bits(min: u32, max: u32) -> u64 {
        let mut bits = 0u64;
        for v in min..=max {
            bits |= 1 << v;
        }
        bits
    }

    /// Parse a single field given its inclusive value range.
    ///
    /// Grammar: `*`, `*/step`, `a`, `a-b`, `a-b/step`, and comma lists of
    /// any of those.
    fn parse(spec: &str, min: u32, max: u32) -> Result<Self, CoreError> {
        let mut bits: u64 = 0;

        for part in spec.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((r, s)) => {
                    let step: u32 = s.parse().map_err(|_| {
                        CoreError::ConfigInvalid(format!("Invalid cron step: {part}"))
                    })?;
                    if step == 0 {
                        return Err(CoreError::ConfigInvalid(format!(
                            "Cron step must be positive: {part}"
                        )));
                    }
                    (r, step)
                }
                None => (part, 1),
            };

            let (lo, hi) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                let lo = a.parse().map_err(|_| {
                    CoreError::ConfigInvalid(format!("Invalid cron range: {part}"))
                })?;
                let hi = b.parse().map_err(|_| {
                    CoreError::ConfigInvalid(format!("Invalid cron range: {part}"))
                })?;
                (lo, hi)
            } else {
                let v: u32 = range.parse().map_err(|_| {
                    CoreError::ConfigInvalid(format!("Invalid cron value: {part}"))
                })?;
                (v, v)
            };

            if lo < min || hi > max || lo > hi {
                return Err(CoreError::ConfigInvalid(format!(
                    "Cron value out of range {min}-{max}: {part}"
                )));
            }

            let mut v = lo;
            while v <= hi {
                bits |= 1 << v;
                v += step;
            }
        }

        if bits == 0 {
            return Err(CoreError::ConfigInvalid("Empty cron field".to_string()));
        }
        Ok(Self { bits })
    }
}

// ---------------------------------------------------------------------------
// CronExpr
// ---------------------------------------------------------------------------

/// A parsed five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronExpr {
    /// Parse a `"min hour dom month dow"` expression.
    ///
    /// Day-of-week uses 0-6 with 0 = Sunday (7 is not accepted).
    pub fn parse(expression: &str) -> Result<Self, CoreError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CoreError::ConfigInvalid(format!(
                "Cron expression must have 5 fields, got {}: {expression:?}",
                fields.len()
            )));
        }
        Ok(Self {
            minute: Field::parse(fields[0], 0, 59)?,
            hour: Field::parse(fields[1], 0, 23)?,
            day_of_month: Field::parse(fields[2], 1, 31)?,
            month: Field::parse(fields[3], 1, 12)?,
            day_of_week: Field::parse(fields[4], 0, 6)?,
        })
    }

    /// Whether the expression matches the given instant (minute resolution).
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.minute.contains(at.minute())
            && self.hour.contains(at.hour())
            && self.matches_day(at)
    }

    /// Standard cron day semantics: when both day-of-month and day-of-week
    /// are restricted, a day matching either one fires.
    fn matches_day(&self, at: DateTime<Utc>) -> bool {
        if !self.month.contains(at.month()) {
            return false;
        }
        let dom_restricted = self.day_of_month.bits != Field::wildcard_bits(1, 31);
        let dow_restricted = self.day_of_week.bits != Field::wildcard_bits(0, 6);
        let dom_ok = self.day_of_month.contains(at.day());
        let dow_ok = self
            .day_of_week
            .contains(at.weekday().num_days_from_sunday());
        match (dom_restricted, dow_restricted) {
            (true, true) => dom_ok || dow_ok,
            _ => dom_ok && dow_ok,
        }
    }

    /// First matching instant strictly after `after`, truncated to the minute.
    ///
    /// Returns `None` if no match exists within the search horizon
    /// (e.g. `0 0 30 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = Utc
            .with_ymd_and_hms(
                after.year(),
                after.month(),
                after.day(),
                after.hour(),
                after.minute(),
                0,
            )
            .single()?;

        let mut day = start.date_naive();
        let horizon = day + Duration::days(SEARCH_HORIZON_DAYS);

        while day <= horizon {
            let midnight = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?);
            if self.matches_day(midnight) {
                for hour in 0..24u32 {
                    if !self.hour.contains(hour) {
                        continue;
                    }
                    for minute in 0..60u32 {
                        if !self.minute.contains(minute) {
                            continue;
                        }
                        let candidate =
                            Utc.from_utc_datetime(&day.and_hms_opt(hour, minute, 0)?);
                        if candidate > start {
                            return Some(candidate);
                        }
                    }
                }
            }
            day += Duration::days(1);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Interval schedules
// ---------------------------------------------------------------------------

/// Next run for an `interval_hours` schedule: `from + hours`.
///
/// Called with `last_run` when one exists, otherwise with "now" so a brand
/// new (or just-resumed) schedule waits one full interval before firing.
pub fn interval_next(from: DateTime<Utc>, interval_hours: i64) -> DateTime<Utc> {
    from + Duration::hours(interval_hours)
}

/// Validate a schedule definition: exactly one of `cron_expression` /
/// `interval_hours` must be present, and the present one must be valid.
pub fn validate_schedule(
    cron_expression: Option<&str>,
    interval_hours: Option<i64>,
) -> Result<(), CoreError> {
    match (cron_expression, interval_hours) {
        (Some(expr), None) => CronExpr::parse(expr).map(|_| ()),
        (None, Some(h)) if h > 0 => Ok(()),
        (None, Some(h)) => Err(CoreError::ConfigInvalid(format!(
            "interval_hours must be positive, got {h}"
        ))),
        (Some(_), Some(_)) => Err(CoreError::ConfigInvalid(
            "Schedule must set exactly one of cron_expression and interval_hours, not both"
                .to_string(),
        )),
        (None, None) => Err(CoreError::ConfigInvalid(
            "Schedule must set cron_expression or interval_hours".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parses_wildcards() {
        assert!(CronExpr::parse("* * * * *").is_ok());
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpr::parse("* * * *").is_err());
        assert!(CronExpr::parse("* * * * * *").is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(CronExpr::parse("60 * * * *").is_err());
        assert!(CronExpr::parse("* 24 * * *").is_err());
        assert!(CronExpr::parse("* * 0 * *").is_err());
        assert!(CronExpr::parse("* * * 13 *").is_err());
        assert!(CronExpr::parse("* * * * 7").is_err());
    }

    #[test]
    fn rejects_zero_step() {
        assert!(CronExpr::parse("*/0 * * * *").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(CronExpr::parse("30-10 * * * *").is_err());
    }

    // -----------------------------------------------------------------------
    // next_after
    // -----------------------------------------------------------------------

    #[test]
    fn hourly_at_minute_zero() {
        let expr = CronExpr::parse("0 * * * *").unwrap();
        let next = expr.next_after(at(2026, 3, 10, 14, 25)).unwrap();
        assert_eq!(next, at(2026, 3, 10, 15, 0));
    }

    #[test]
    fn next_is_strictly_after() {
        let expr = CronExpr::parse("0 * * * *").unwrap();
        let next = expr.next_after(at(2026, 3, 10, 14, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 10, 15, 0));
    }

    #[test]
    fn daily_at_two_thirty() {
        let expr = CronExpr::parse("30 2 * * *").unwrap();
        let next = expr.next_after(at(2026, 3, 10, 3, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 11, 2, 30));
    }

    #[test]
    fn every_fifteen_minutes() {
        let expr = CronExpr::parse("*/15 * * * *").unwrap();
        let next = expr.next_after(at(2026, 3, 10, 14, 16)).unwrap();
        assert_eq!(next, at(2026, 3, 10, 14, 30));
    }

    #[test]
    fn weekday_restriction() {
        // 2026-03-13 is a Friday; next Monday is 2026-03-16.
        let expr = CronExpr::parse("0 9 * * 1").unwrap();
        let next = expr.next_after(at(2026, 3, 13, 10, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 16, 9, 0));
    }

    #[test]
    fn month_rollover() {
        let expr = CronExpr::parse("0 0 1 * *").unwrap();
        let next = expr.next_after(at(2026, 3, 31, 12, 0)).unwrap();
        assert_eq!(next, at(2026, 4, 1, 0, 0));
    }

    #[test]
    fn dom_and_dow_fire_on_either_when_both_restricted() {
        // Day 15 OR Sunday. From Fri 2026-03-13, Sunday the 15th matches both;
        // from Mon 2026-03-16 the next match is Sunday the 22nd.
        let expr = CronExpr::parse("0 0 15 * 0").unwrap();
        assert_eq!(
            expr.next_after(at(2026, 3, 13, 0, 0)).unwrap(),
            at(2026, 3, 15, 0, 0)
        );
        assert_eq!(
            expr.next_after(at(2026, 3, 16, 0, 0)).unwrap(),
            at(2026, 3, 22, 0, 0)
        );
    }

    #[test]
    fn leap_day_schedule_found_within_horizon() {
        let expr = CronExpr::parse("0 0 29 2 *").unwrap();
        let next = expr.next_after(at(2026, 3, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2028, 2, 29, 0, 0));
    }

    #[test]
    fn impossible_date_returns_none() {
        let expr = CronExpr::parse("0 0 30 2 *").unwrap();
        assert!(expr.next_after(at(2026, 1, 1, 0, 0)).is_none());
    }

    // -----------------------------------------------------------------------
    // Interval schedules
    // -----------------------------------------------------------------------

    #[test]
    fn interval_adds_hours() {
        let next = interval_next(at(2026, 3, 10, 14, 0), 6);
        assert_eq!(next, at(2026, 3, 10, 20, 0));
    }

    #[test]
    fn resume_recomputes_from_now_not_stale_next_run() {
        // A 1-hour schedule paused at T and resumed at T+90min must next
        // fire at T+90min+1h, not at the stale T+1h.
        let paused_at = at(2026, 3, 10, 12, 0);
        let resumed_at = paused_at + Duration::minutes(90);
        let next = interval_next(resumed_at, 1);
        assert_eq!(next, at(2026, 3, 10, 14, 30));
    }

    // -----------------------------------------------------------------------
    // validate_schedule
    // -----------------------------------------------------------------------

    #[test]
    fn exactly_one_of_cron_or_interval() {
        assert!(validate_schedule(Some("0 * * * *"), None).is_ok());
        assert!(validate_schedule(None, Some(4)).is_ok());
        assert!(validate_schedule(Some("0 * * * *"), Some(4)).is_err());
        assert!(validate_schedule(None, None).is_err());
    }

    #[test]
    fn bad_expression_rejected() {
        assert!(validate_schedule(Some("not a cron"), None).is_err());
    }

    #[test]
    fn non_positive_interval_rejected() {
        assert!(validate_schedule(None, Some(0)).is_err());
        assert!(validate_schedule(None, Some(-2)).is_err());
    }
}
