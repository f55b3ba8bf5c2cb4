use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CoreError, FieldError};

/// Day-walking kinds give up after scanning this many days past the
/// lower bound; a valid pattern always hits within a month, so running
/// into the cap means the caller passed an unbounded search.
const MAX_SCAN_DAYS: i64 = 3_660;

/// Year cap for `AnnualOnDate`; generous enough for Feb 29 anchors.
const MAX_SCAN_YEARS: i32 = 400;

/// Tag identifying which recurrence rule a pattern string encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceKind {
    EveryDay,
    WorkDay,
    WeekEnd,
    AnnualOnDate,
    WeekTemplate,
    MonthTemplate,
    MonthDayForwardTemplate,
    MonthDayBackwardTemplate,
    EveryNDay,
    Sequence,
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurrenceKind::EveryDay => "everyday",
            RecurrenceKind::WorkDay => "workday",
            RecurrenceKind::WeekEnd => "weekend",
            RecurrenceKind::AnnualOnDate => "annualondate",
            RecurrenceKind::WeekTemplate => "weektemplate",
            RecurrenceKind::MonthTemplate => "monthtemplate",
            RecurrenceKind::MonthDayForwardTemplate => "monthdayforwardtemplate",
            RecurrenceKind::MonthDayBackwardTemplate => "monthdaybackwardtemplate",
            RecurrenceKind::EveryNDay => "everynday",
            RecurrenceKind::Sequence => "sequence",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence kind: {0}")]
pub struct ParseRecurrenceKindError(String);

impl FromStr for RecurrenceKind {
    type Err = ParseRecurrenceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "everyday" => Ok(RecurrenceKind::EveryDay),
            "workday" => Ok(RecurrenceKind::WorkDay),
            "weekend" => Ok(RecurrenceKind::WeekEnd),
            "annualondate" => Ok(RecurrenceKind::AnnualOnDate),
            "weektemplate" => Ok(RecurrenceKind::WeekTemplate),
            "monthdayforwardtemplate" => Ok(RecurrenceKind::MonthDayForwardTemplate),
            "monthdaybackwardtemplate" => Ok(RecurrenceKind::MonthDayBackwardTemplate),
            "monthtemplate" => Ok(RecurrenceKind::MonthTemplate),
            "everynday" => Ok(RecurrenceKind::EveryNDay),
            "sequence" => Ok(RecurrenceKind::Sequence),
            _ => Err(ParseRecurrenceKindError(s.to_string())),
        }
    }
}

/// A validated recurrence rule.
///
/// The wire shape is a `(kind, pattern)` pair of strings; parsing via
/// [`Recurrence::from_parts`] checks the pattern against the kind's shape
/// rule once, so an invalid combination is unrepresentable afterwards and
/// occurrence math never re-validates.
///
/// Week bitmaps are indexed with Sunday = 0; month bitmaps with index =
/// day-of-month − 1. The forward/backward month variants keep distinct
/// tags but share occurrence math with `MonthTemplate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recurrence {
    /// Every calendar day.
    EveryDay,
    /// Monday through Friday.
    WorkDay,
    /// Saturday and Sunday.
    WeekEnd,
    /// The anchor's calendar day, every year.
    AnnualOnDate,
    /// Day-of-week bitmap, at least one day set.
    WeekTemplate([bool; 7]),
    /// Day-of-month bitmap, at least one day set.
    MonthTemplate([bool; 31]),
    MonthDayForward([bool; 31]),
    MonthDayBackward([bool; 31]),
    /// Every N days counted from the anchor; the anchor itself occurs.
    EveryNDay(i64),
    /// Repeating cycle of day deltas applied from the previous
    /// occurrence; the anchor itself does not occur.
    Sequence(Vec<i64>),
}

fn is_bitmap(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.bytes().all(|b| b == b'0' || b == b'1')
}

fn bitmap_to_mask<const N: usize>(pattern: &str) -> [bool; N] {
    let mut mask = [false; N];
    for (i, b) in pattern.bytes().enumerate() {
        mask[i] = b == b'1';
    }
    mask
}

fn pattern_error(kind: RecurrenceKind, expected: &str) -> FieldError {
    FieldError::new("pattern", format!("{}: pattern must be {}", kind, expected))
}

impl Recurrence {
    /// Parses and validates a `(kind, pattern)` pair.
    ///
    /// # Arguments
    /// * `kind` - Which rule family the pattern encodes
    /// * `pattern` - The raw pattern string (shape depends on `kind`)
    /// * `anchor_date` - Calendar date of the schedule's `start_at`, used
    ///   to check the non-empty `AnnualOnDate` form
    ///
    /// # Returns
    /// The parsed variant, or a [`FieldError`] tagged `"pattern"` so the
    /// caller can collect it alongside other field violations.
    pub fn from_parts(
        kind: RecurrenceKind,
        pattern: &str,
        anchor_date: NaiveDate,
    ) -> Result<Self, FieldError> {
        match kind {
            RecurrenceKind::EveryDay => match pattern {
                "" | "1" => Ok(Recurrence::EveryDay),
                _ => Err(pattern_error(kind, "empty or \"1\"")),
            },
            RecurrenceKind::WorkDay => match pattern {
                "" | "0111110" => Ok(Recurrence::WorkDay),
                _ => Err(pattern_error(kind, "empty or \"0111110\"")),
            },
            RecurrenceKind::WeekEnd => match pattern {
                "" | "1000001" => Ok(Recurrence::WeekEnd),
                _ => Err(pattern_error(kind, "empty or \"1000001\"")),
            },
            RecurrenceKind::AnnualOnDate => {
                if pattern.is_empty() {
                    return Ok(Recurrence::AnnualOnDate);
                }
                match NaiveDate::from_str(pattern) {
                    Ok(date) if date == anchor_date => Ok(Recurrence::AnnualOnDate),
                    _ => Err(pattern_error(
                        kind,
                        "empty or a date equal to the schedule's start date",
                    )),
                }
            }
            RecurrenceKind::WeekTemplate => {
                if pattern.len() == 7 && is_bitmap(pattern) && pattern.contains('1') {
                    Ok(Recurrence::WeekTemplate(bitmap_to_mask(pattern)))
                } else {
                    Err(pattern_error(
                        kind,
                        "exactly 7 binary digits with at least one '1'",
                    ))
                }
            }
            RecurrenceKind::MonthTemplate
            | RecurrenceKind::MonthDayForwardTemplate
            | RecurrenceKind::MonthDayBackwardTemplate => {
                if pattern.len() == 31 && is_bitmap(pattern) && pattern.contains('1') {
                    let mask = bitmap_to_mask(pattern);
                    Ok(match kind {
                        RecurrenceKind::MonthDayForwardTemplate => Recurrence::MonthDayForward(mask),
                        RecurrenceKind::MonthDayBackwardTemplate => {
                            Recurrence::MonthDayBackward(mask)
                        }
                        _ => Recurrence::MonthTemplate(mask),
                    })
                } else {
                    Err(pattern_error(
                        kind,
                        "exactly 31 binary digits with at least one '1'",
                    ))
                }
            }
            RecurrenceKind::EveryNDay => {
                let valid = pattern.len() >= 2
                    && is_bitmap(pattern)
                    && pattern.starts_with('1')
                    && pattern[1..].bytes().all(|b| b == b'0');
                if valid {
                    Ok(Recurrence::EveryNDay(pattern.len() as i64))
                } else {
                    Err(pattern_error(
                        kind,
                        "a single '1' followed by one or more '0's",
                    ))
                }
            }
            RecurrenceKind::Sequence => {
                let ones = pattern.bytes().filter(|&b| b == b'1').count();
                let valid = pattern.len() >= 2
                    && is_bitmap(pattern)
                    && pattern.starts_with('1')
                    && pattern.ends_with('0')
                    && ones >= 2;
                if valid {
                    let deltas = pattern
                        .bytes()
                        .enumerate()
                        .filter(|&(_, b)| b == b'1')
                        .map(|(i, _)| i as i64 + 1)
                        .collect();
                    Ok(Recurrence::Sequence(deltas))
                } else {
                    Err(pattern_error(
                        kind,
                        "binary digits starting with '1', ending with '0', with at least two '1's",
                    ))
                }
            }
        }
    }

    /// The kind tag this rule was parsed from.
    pub fn kind(&self) -> RecurrenceKind {
        match self {
            Recurrence::EveryDay => RecurrenceKind::EveryDay,
            Recurrence::WorkDay => RecurrenceKind::WorkDay,
            Recurrence::WeekEnd => RecurrenceKind::WeekEnd,
            Recurrence::AnnualOnDate => RecurrenceKind::AnnualOnDate,
            Recurrence::WeekTemplate(_) => RecurrenceKind::WeekTemplate,
            Recurrence::MonthTemplate(_) => RecurrenceKind::MonthTemplate,
            Recurrence::MonthDayForward(_) => RecurrenceKind::MonthDayForwardTemplate,
            Recurrence::MonthDayBackward(_) => RecurrenceKind::MonthDayBackwardTemplate,
            Recurrence::EveryNDay(_) => RecurrenceKind::EveryNDay,
            Recurrence::Sequence(_) => RecurrenceKind::Sequence,
        }
    }

    /// Computes the earliest occurrence at or after `lower_bound`.
    ///
    /// # Arguments
    /// * `anchor` - The schedule's `start_at`; every occurrence inherits
    ///   its time-of-day, and no occurrence precedes it
    /// * `lower_bound` - Search floor
    ///
    /// # Returns
    /// The next occurrence instant, or `None` once the scan caps are
    /// exhausted. Callers bound the search with the schedule's
    /// `finish_at` when one is set.
    ///
    /// If `lower_bound` falls on a candidate date but after the anchor's
    /// time-of-day, that date has already occurred and the search moves
    /// to the next candidate.
    pub fn next_occurrence(
        &self,
        anchor: DateTime<Utc>,
        lower_bound: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let threshold = anchor.max(lower_bound);
        match self {
            Recurrence::EveryDay => scan_days(anchor, threshold, |_| true),
            Recurrence::WorkDay => scan_days(anchor, threshold, |d| {
                (1..=5).contains(&d.weekday().num_days_from_sunday())
            }),
            Recurrence::WeekEnd => scan_days(anchor, threshold, |d| {
                matches!(d.weekday().num_days_from_sunday(), 0 | 6)
            }),
            Recurrence::WeekTemplate(mask) => scan_days(anchor, threshold, |d| {
                mask[d.weekday().num_days_from_sunday() as usize]
            }),
            Recurrence::MonthTemplate(mask)
            | Recurrence::MonthDayForward(mask)
            | Recurrence::MonthDayBackward(mask) => {
                scan_days(anchor, threshold, |d| mask[d.day0() as usize])
            }
            Recurrence::AnnualOnDate => next_annual(anchor, threshold),
            Recurrence::EveryNDay(period) => next_stepped(anchor, threshold, *period),
            Recurrence::Sequence(deltas) => next_in_cycle(anchor, threshold, deltas),
        }
    }

    /// Decides whether at least one occurrence falls inside `[from, to)`.
    ///
    /// # Errors
    /// * [`CoreError::InvalidRange`] if `from > to`
    /// * [`CoreError::Precondition`] if `from < anchor`; callers must
    ///   normalize the window first
    pub fn can_occur_within(
        &self,
        anchor: DateTime<Utc>,
        finish_at: Option<DateTime<Utc>>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        if from > to {
            return Err(CoreError::InvalidRange { from, to });
        }
        if let Some(finish) = finish_at {
            if from > finish {
                return Ok(false);
            }
        }
        if from < anchor {
            return Err(CoreError::Precondition(format!(
                "window start {} precedes schedule anchor {}",
                from, anchor
            )));
        }
        Ok(match self.next_occurrence(anchor, from) {
            Some(next) => next < to && finish_at.map_or(true, |finish| next <= finish),
            None => false,
        })
    }
}

fn occurrence_at(date: NaiveDate, time_of_day: NaiveTime) -> DateTime<Utc> {
    date.and_time(time_of_day).and_utc()
}

/// Walks forward one calendar day at a time until `predicate` accepts a
/// date whose occurrence instant is at or past `threshold`.
fn scan_days(
    anchor: DateTime<Utc>,
    threshold: DateTime<Utc>,
    predicate: impl Fn(NaiveDate) -> bool,
) -> Option<DateTime<Utc>> {
    let time_of_day = anchor.time();
    let mut date = threshold.date_naive();
    if occurrence_at(date, time_of_day) < threshold {
        date = date.succ_opt()?;
    }
    for _ in 0..MAX_SCAN_DAYS {
        if predicate(date) {
            return Some(occurrence_at(date, time_of_day));
        }
        date = date.succ_opt()?;
    }
    None
}

fn next_annual(anchor: DateTime<Utc>, threshold: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time_of_day = anchor.time();
    let (month, day) = (anchor.month(), anchor.day());
    let mut year = threshold.year().max(anchor.year());
    for _ in 0..MAX_SCAN_YEARS {
        // from_ymd_opt is None for years lacking the anchor's day (Feb 29).
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = occurrence_at(date, time_of_day);
            if candidate >= threshold && candidate >= anchor {
                return Some(candidate);
            }
        }
        year += 1;
    }
    None
}

fn next_stepped(
    anchor: DateTime<Utc>,
    threshold: DateTime<Utc>,
    period: i64,
) -> Option<DateTime<Utc>> {
    let elapsed = (threshold - anchor).num_seconds();
    let period_secs = period * 86_400;
    let steps = if elapsed <= 0 {
        0
    } else {
        (elapsed + period_secs - 1) / period_secs
    };
    let mut candidate = anchor.checked_add_signed(Duration::days(steps * period))?;
    // num_seconds truncates sub-second remainders; nudge if we landed short.
    while candidate < threshold {
        candidate = candidate.checked_add_signed(Duration::days(period))?;
    }
    Some(candidate)
}

fn next_in_cycle(
    anchor: DateTime<Utc>,
    threshold: DateTime<Utc>,
    deltas: &[i64],
) -> Option<DateTime<Utc>> {
    let scan_limit = (threshold - anchor).num_days().max(0) + MAX_SCAN_DAYS;
    let mut current = anchor;
    let mut walked = 0;
    loop {
        for &delta in deltas {
            current = current.checked_add_signed(Duration::days(delta))?;
            if current >= threshold {
                return Some(current);
            }
            walked += delta;
            if walked > scan_limit {
                return None;
            }
        }
    }
}
