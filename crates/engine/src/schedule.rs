//! Weekly checkin windows.
//!
//! Every week has two 24 hour windows, both opening at 16:00 local time of
//! the configured timezone:
//!
//! - the "after" window, Monday 16:00 → Tuesday 16:00;
//! - the "before" window, Tuesday 16:00 → Wednesday 16:00.
//!
//! Everything here is a pure function of the `now` passed in; nothing reads
//! the wall clock.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Local hour at which both windows open and close.
pub const WINDOW_HOUR: u32 = 16;
/// Length of a window, in hours.
pub const WINDOW_HOURS: i64 = 24;

fn window_length() -> TimeDelta {
    TimeDelta::hours(WINDOW_HOURS)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinKind {
    Before,
    After,
}

impl CheckinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl TryFrom<&str> for CheckinKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            other => Err(EngineError::KeyNotFound(format!(
                "invalid checkin kind: {other}"
            ))),
        }
    }
}

/// The next checkin deadline and its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextCheckin {
    pub kind: CheckinKind,
    pub at: DateTime<Utc>,
}

/// Computes checkin windows in a fixed timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckinClock {
    tz: Tz,
}

impl Default for CheckinClock {
    fn default() -> Self {
        Self::new(chrono_tz::America::Los_Angeles)
    }
}

impl CheckinClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build a clock from an IANA timezone name.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::new)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Deadline of the next "after" checkin (Tuesday 16:00).
    pub fn next_after_checkin(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.at_window_hour(self.next_after_date(now))
    }

    /// Deadline of the next "before" checkin (Wednesday 16:00).
    pub fn next_before_checkin(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.at_window_hour(self.next_before_date(now))
    }

    pub fn prev_after_checkin(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.at_window_hour(self.next_after_date(now) - TimeDelta::days(7))
    }

    pub fn prev_before_checkin(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.at_window_hour(self.next_before_date(now) - TimeDelta::days(7))
    }

    pub fn in_before_window(&self, now: DateTime<Utc>) -> bool {
        within_window(now, self.next_before_checkin(now))
    }

    pub fn in_after_window(&self, now: DateTime<Utc>) -> bool {
        within_window(now, self.next_after_checkin(now))
    }

    pub fn in_a_checkin_window(&self, now: DateTime<Utc>) -> bool {
        self.in_before_window(now) || self.in_after_window(now)
    }

    /// Whichever of the two next occurrences comes first.
    pub fn next_checkin(&self, now: DateTime<Utc>) -> NextCheckin {
        let before = self.next_before_checkin(now);
        let after = self.next_after_checkin(now);
        if before < after {
            NextCheckin {
                kind: CheckinKind::Before,
                at: before,
            }
        } else {
            NextCheckin {
                kind: CheckinKind::After,
                at: after,
            }
        }
    }

    /// Earliest creation time of a checkin that still counts as current.
    ///
    /// Inside the after window this is the window's opening; otherwise it is
    /// the opening of the most recent after window.
    pub fn cycle_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.in_after_window(now) {
            self.next_checkin(now).at - window_length()
        } else {
            self.prev_after_checkin(now) - window_length()
        }
    }

    /// Human label of the checkin week containing `time`, e.g. `"Jul 2-Jul 8"`.
    ///
    /// A checkin week starts on Tuesday at 16:00.
    pub fn week_for_time(&self, time: DateTime<Utc>) -> String {
        let local = time.with_timezone(&self.tz);
        let weekday = i64::from(local.weekday().num_days_from_monday());
        let past_anchor = weekday > 1 || (weekday == 1 && local.hour() >= WINDOW_HOUR);
        let back = if past_anchor { weekday - 1 } else { weekday + 6 };
        let start = local.date_naive() - TimeDelta::days(back);
        let end = start + TimeDelta::days(6);
        format!("{}-{}", start.format("%b %-d"), end.format("%b %-d"))
    }

    fn next_after_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let local = now.with_timezone(&self.tz);
        let this_week = match local.weekday() {
            Weekday::Mon => true,
            Weekday::Tue => local.hour() < WINDOW_HOUR,
            _ => false,
        };
        let monday = week_start(local.date_naive());
        monday + TimeDelta::days(if this_week { 1 } else { 8 })
    }

    fn next_before_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let local = now.with_timezone(&self.tz);
        let this_week = match local.weekday() {
            Weekday::Mon | Weekday::Tue => true,
            Weekday::Wed => local.hour() < WINDOW_HOUR,
            _ => false,
        };
        let monday = week_start(local.date_naive());
        monday + TimeDelta::days(if this_week { 2 } else { 9 })
    }

    fn at_window_hour(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(WINDOW_HOUR));
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
            .with_timezone(&Utc)
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()))
}

fn within_window(now: DateTime<Utc>, close: DateTime<Utc>) -> bool {
    now > close - window_length() && now < close
}
