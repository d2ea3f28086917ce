use crate::model::DayOfWeek;
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hours: u32,
    pub minutes: u32,
}

/// Strict "HH:MM" (24h, zero-padded). Anything else is None; callers turn
/// that into a field-level validation error.
pub fn parse_time(s: &str) -> Option<TimeOfDay> {
    let (h, m) = s.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(TimeOfDay { hours, minutes })
}

pub fn to_minutes(t: TimeOfDay) -> u32 {
    t.hours * 60 + t.minutes
}

/// Half-open interval overlap: back-to-back ranges (a ends exactly when b
/// starts) do not overlap.
pub fn ranges_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn day_of_week(date: NaiveDate) -> DayOfWeek {
    DayOfWeek::from_weekday(date.weekday())
}

/// The academic year starts September 1. Fixed policy, not configurable:
/// existing recurring slots are tagged odd/even relative to this anchor.
pub const ACADEMIC_YEAR_START_MONTH: u32 = 9;

pub fn academic_year_anchor(date: NaiveDate) -> NaiveDate {
    let year = if date.month() >= ACADEMIC_YEAR_START_MONTH {
        date.year()
    } else {
        date.year() - 1
    };
    NaiveDate::from_ymd_opt(year, ACADEMIC_YEAR_START_MONTH, 1).unwrap_or(date)
}

/// The first week of the academic year counts as odd.
pub fn is_odd_week(date: NaiveDate) -> bool {
    let anchor = academic_year_anchor(date);
    let weeks = (date - anchor).num_days().div_euclid(7);
    weeks % 2 == 0
}
