// =============================================================================
// PERIOD MODULE
// =============================================================================
// Calendar arithmetic for the month and week views: month lengths, week
// boundaries (Sunday to Saturday), inclusive date ranges, navigation and the
// header labels shown above the calendar and the revenue summary.
//
// Everything here is pure: no clock, no I/O. Callers pass "today" in.
//
// NOTES:
// - Months are 1-based (January = 1), the chrono convention
// - Ranges are inclusive on both ends and compare as YYYY-MM-DD strings
// =============================================================================

use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// =============================================================================
// VIEW MODE & DIRECTION
// =============================================================================

/// Which window the calendar shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Month,
    Week,
}

/// Navigation arrows in the calendar header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "prev")]
    Previous,
    #[serde(rename = "next")]
    Next,
}

// =============================================================================
// YEAR / MONTH
// =============================================================================
/// A calendar month, used for month-mode navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns None unless `month` is in 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// January rolls back to December of the previous year
    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// December rolls over to January of the next year
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

// =============================================================================
// MONTH & WEEK ARITHMETIC
// =============================================================================

/// Years a client may anchor a view or range on. Week and month arithmetic
/// below assumes its input lies inside these years.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

pub fn is_supported(date: NaiveDate) -> bool {
    SUPPORTED_YEARS.contains(&date.year())
}

/// Number of days in a month: the day before the first of the next month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let next = YearMonth::new(year, month)?.next();
    next.first_day()?.pred_opt().map(|last| last.day())
}

/// Weekday of the 1st, 0 = Sunday .. 6 = Saturday.
/// This is the number of blank cells before day 1 in the month grid.
pub fn first_weekday_of_month(year: i32, month: u32) -> Option<u32> {
    YearMonth::new(year, month)?
        .first_day()
        .map(|first| first.weekday().num_days_from_sunday())
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// Sunday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Saturday on or after `date`
pub fn week_end(date: NaiveDate) -> NaiveDate {
    week_start(date) + Duration::days(6)
}

pub fn month_range(date: NaiveDate) -> DateRange {
    let start = month_start(date);
    // None only at the far edge of chrono's representable years
    let len = days_in_month(date.year(), date.month()).unwrap_or(1);
    DateRange {
        start,
        end: start + Duration::days(i64::from(len) - 1),
    }
}

pub fn week_range(date: NaiveDate) -> DateRange {
    DateRange {
        start: week_start(date),
        end: week_end(date),
    }
}

// =============================================================================
// DATE RANGE
// =============================================================================
/// Inclusive [start, end] window. Serializes as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date from start to end, inclusive
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn start_iso(&self) -> String {
        iso_date(self.start)
    }

    pub fn end_iso(&self) -> String {
        iso_date(self.end)
    }

    pub fn label(&self) -> String {
        range_label(self.start, self.end)
    }
}

// =============================================================================
// PERIOD (anchor + view mode)
// =============================================================================
/// The window the calendar is looking at. Month mode anchors on the first of
/// the month once navigated; week mode may anchor on any day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub anchor: NaiveDate,
    pub mode: ViewMode,
}

impl Period {
    pub fn new(anchor: NaiveDate, mode: ViewMode) -> Self {
        Self { anchor, mode }
    }

    pub fn range(&self) -> DateRange {
        match self.mode {
            ViewMode::Month => month_range(self.anchor),
            ViewMode::Week => week_range(self.anchor),
        }
    }

    /// One calendar month in month mode, exactly seven days in week mode
    pub fn step(&self, direction: Direction) -> Self {
        let anchor = match self.mode {
            ViewMode::Month => {
                let current = YearMonth::of(self.anchor);
                let target = match direction {
                    Direction::Previous => current.previous(),
                    Direction::Next => current.next(),
                };
                target.first_day().unwrap_or(self.anchor)
            }
            ViewMode::Week => match direction {
                Direction::Previous => self.anchor - Duration::days(7),
                Direction::Next => self.anchor + Duration::days(7),
            },
        };
        Self {
            anchor,
            mode: self.mode,
        }
    }

    /// Switching month -> week lands on the week containing `today`, not on
    /// the month that was being viewed. Week -> month keeps the anchor's month.
    pub fn with_mode(&self, mode: ViewMode, today: NaiveDate) -> Self {
        match (self.mode, mode) {
            (from, to) if from == to => *self,
            (_, ViewMode::Week) => Self::new(week_start(today), ViewMode::Week),
            (_, ViewMode::Month) => Self::new(month_start(self.anchor), ViewMode::Month),
        }
    }

    /// Calendar header: "January 2024" or "Jan 28 - Feb 3, 2024"
    pub fn label(&self) -> String {
        match self.mode {
            ViewMode::Month => month_label(self.anchor),
            ViewMode::Week => self.range().label(),
        }
    }

    /// Revenue panel header: week mode is prefixed with the ISO week number
    pub fn summary_label(&self) -> String {
        match self.mode {
            ViewMode::Month => month_label(self.anchor),
            ViewMode::Week => {
                let range = self.range();
                // Monday of a Sunday-first week carries the ISO number of Mon..Sat
                let monday = range.start + Duration::days(1);
                format!("Week {}: {}", iso_week_number(monday), range.label())
            }
        }
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// "January" for 1; empty for anything outside 1..=12
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index as usize))
        .copied()
        .unwrap_or("")
}

pub fn short_month_name(month: u32) -> &'static str {
    let name = month_name(month);
    name.get(..3).unwrap_or(name)
}

/// "January 2024"
pub fn month_label(date: NaiveDate) -> String {
    format!("{} {}", month_name(date.month()), date.year())
}

/// "Mar 3 - 9, 2025" within one month, else "Jan 28 - Feb 3, 2024".
/// The year shown is the end's year.
pub fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    if start.year() == end.year() && start.month() == end.month() {
        format!(
            "{} {} - {}, {}",
            short_month_name(start.month()),
            start.day(),
            end.day(),
            end.year()
        )
    } else {
        format!(
            "{} {} - {} {}, {}",
            short_month_name(start.month()),
            start.day(),
            short_month_name(end.month()),
            end.day(),
            end.year()
        )
    }
}

pub fn iso_week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}
