//! Opening hours and reservation time slots.
//!
//! Slots are half-hour starts between opening and closing time with the lunch
//! window removed. A holiday closes the whole day.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::Serialize;

pub const SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub open: (u32, u32),
    pub close: (u32, u32),
    pub lunch: Option<((u32, u32), (u32, u32))>,
}

const WEEKDAY_HOURS: OpeningHours = OpeningHours {
    open: (9, 0),
    close: (18, 0),
    lunch: Some(((13, 0), (14, 0))),
};

const SATURDAY_HOURS: OpeningHours = OpeningHours {
    open: (9, 0),
    close: (13, 0),
    lunch: None,
};

pub fn hours_for(weekday: Weekday) -> Option<OpeningHours> {
    match weekday {
        Weekday::Sun => None,
        Weekday::Sat => Some(SATURDAY_HOURS),
        _ => Some(WEEKDAY_HOURS),
    }
}

fn minutes((h, m): (u32, u32)) -> u32 {
    h * 60 + m
}

fn to_time(total: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(total / 60, total % 60, 0)
}

impl OpeningHours {
    pub fn slots(&self) -> Vec<NaiveTime> {
        let close = minutes(self.close);
        let mut out = Vec::new();
        let mut t = minutes(self.open);
        while t + SLOT_MINUTES <= close {
            let at_lunch = self
                .lunch
                .is_some_and(|(from, to)| t >= minutes(from) && t < minutes(to));
            if !at_lunch {
                if let Some(time) = to_time(t) {
                    out.push(time);
                }
            }
            t += SLOT_MINUTES;
        }
        out
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub closed: bool,
    pub slots: Vec<String>,
}

/// Bookable slots for `date`. When `now` falls on the same day, slots that
/// have already started are dropped; earlier dates have none.
pub fn day_slots(date: NaiveDate, is_holiday: bool, now: NaiveDateTime) -> DaySchedule {
    let hours = if is_holiday { None } else { hours_for(date.weekday()) };
    let Some(hours) = hours else {
        return DaySchedule { date, closed: true, slots: vec![] };
    };

    let today = now.date();
    let slots = if date < today {
        vec![]
    } else {
        hours
            .slots()
            .into_iter()
            .filter(|t| date > today || *t > now.time())
            .map(format_slot)
            .collect()
    };

    DaySchedule { date, closed: false, slots }
}

/// Whether `time` is one of the regular slots of `date` (ignores the clock).
pub fn is_valid_slot(date: NaiveDate, time: NaiveTime, is_holiday: bool) -> bool {
    if is_holiday {
        return false;
    }
    hours_for(date.weekday()).is_some_and(|h| h.slots().contains(&time))
}

pub fn format_slot(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

pub fn parse_slot(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}
