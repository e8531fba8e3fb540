use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::playlist::next_id;

const SECONDS_PER_DAY: i64 = 86_400;
pub const MAX_PRIORITY: u8 = 10;

fn every_day() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}

fn enabled_by_default() -> bool {
    true
}

/// A time window during which a playlist should play.
///
/// Windows whose end time is at or before the start time run overnight;
/// the day and date filters apply to the day the window opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(skip, default = "next_id")]
    id: u32,
    pub name: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub random: bool,
    /// Total passes when looping; unlimited if absent
    #[serde(default)]
    pub loops: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "every_day")]
    pub days: Vec<Weekday>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(skip)]
    extra_minutes: i64,
}

impl Schedule {
    pub fn new(name: &str, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            id: next_id(),
            name: name.to_string(),
            priority: 0,
            enabled: true,
            looping: false,
            random: false,
            loops: None,
            start_date: None,
            end_date: None,
            days: every_day(),
            start_time,
            end_time,
            extra_minutes: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn extra_minutes(&self) -> i64 {
        self.extra_minutes
    }

    /// Push the end of the window out, used to extend a running show
    pub fn add_mins_to_end_time(&mut self, minutes: i64) {
        self.extra_minutes += minutes;
        log::info!(
            "Schedule {} end time extended by {} minutes to {} extra",
            self.name,
            minutes,
            self.extra_minutes
        );
    }

    fn date_allowed(&self, date: NaiveDate) -> bool {
        self.days.contains(&date.weekday())
            && self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }

    /// Window bounds in seconds from the midnight the window opened
    fn window(&self) -> (i64, i64) {
        let start = self.start_time.num_seconds_from_midnight() as i64;
        let mut end = self.end_time.num_seconds_from_midnight() as i64;
        if end <= start {
            end += SECONDS_PER_DAY;
        }
        (start, end + self.extra_minutes * 60)
    }

    /// Date of the day whose window contains `now`
    fn opened_on(&self, now: NaiveDateTime) -> Option<NaiveDate> {
        if !self.enabled {
            return None;
        }

        let (start, end) = self.window();
        let seconds = now.time().num_seconds_from_midnight() as i64;
        let today = now.date();

        if self.date_allowed(today) && start <= seconds && seconds < end {
            return Some(today);
        }

        // A window opened yesterday may still be running
        let yesterday = today.pred_opt()?;
        let seconds = seconds + SECONDS_PER_DAY;
        if self.date_allowed(yesterday) && start <= seconds && seconds < end {
            return Some(yesterday);
        }

        None
    }

    pub fn check_active(&self, now: NaiveDateTime) -> bool {
        self.opened_on(now).is_some()
    }

    /// When the current window closes, if one is open
    pub fn next_end_time(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let opened = self.opened_on(now)?;
        let (_, end) = self.window();
        Some(opened.and_hms_opt(0, 0, 0)? + Duration::seconds(end))
    }

    /// Whether both schedules could be active at the same moment
    pub fn overlaps(&self, other: &Schedule) -> bool {
        if !self.enabled || !other.enabled {
            return false;
        }

        let latest_start = self.start_date.max(other.start_date);
        let earliest_end = match (self.end_date, other.end_date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let (Some(start), Some(end)) = (latest_start, earliest_end) {
            if start > end {
                return false;
            }
        }
        if !self.days.iter().any(|d| other.days.contains(d)) {
            return false;
        }

        let (a_start, a_end) = self.window();
        let (b_start, b_end) = other.window();
        [-SECONDS_PER_DAY, 0, SECONDS_PER_DAY]
            .iter()
            .any(|shift| a_start < b_end + shift && b_start + shift < a_end)
    }

    /// When the window next opens after `now`, looking up to a week ahead
    /// of any start date
    pub fn next_start_time(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.enabled {
            return None;
        }

        let first = match self.start_date {
            Some(start) if start > now.date() => start,
            _ => now.date(),
        };

        (0..8)
            .filter_map(|offset| first.checked_add_signed(Duration::days(offset)))
            .filter(|date| self.date_allowed(*date))
            .map(|date| date.and_time(self.start_time))
            .find(|start| *start > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_daytime_window() {
        let schedule = Schedule::new("Evening", hm(17, 0), hm(22, 0));

        assert!(!schedule.check_active(at("2024-12-01", "16:59:59")));
        assert!(schedule.check_active(at("2024-12-01", "17:00:00")));
        assert!(schedule.check_active(at("2024-12-01", "21:59:59")));
        assert!(!schedule.check_active(at("2024-12-01", "22:00:00")));
    }

    #[test]
    fn test_overnight_window_uses_opening_day() {
        let mut schedule = Schedule::new("Late", hm(22, 0), hm(2, 0));
        // 2024-12-06 is a Friday
        schedule.days = vec![Weekday::Fri];

        assert!(schedule.check_active(at("2024-12-06", "23:30:00")));
        assert!(schedule.check_active(at("2024-12-07", "01:30:00")));
        assert!(!schedule.check_active(at("2024-12-07", "23:30:00")));
        assert!(!schedule.check_active(at("2024-12-06", "01:30:00")));
    }

    #[test]
    fn test_date_range() {
        let mut schedule = Schedule::new("Season", hm(18, 0), hm(19, 0));
        schedule.start_date = NaiveDate::from_ymd_opt(2024, 12, 1);
        schedule.end_date = NaiveDate::from_ymd_opt(2024, 12, 31);

        assert!(!schedule.check_active(at("2024-11-30", "18:30:00")));
        assert!(schedule.check_active(at("2024-12-15", "18:30:00")));
        assert!(!schedule.check_active(at("2025-01-01", "18:30:00")));
    }

    #[test]
    fn test_disabled_never_active() {
        let mut schedule = Schedule::new("Off", hm(0, 0), hm(23, 59));
        schedule.enabled = false;
        assert!(!schedule.check_active(at("2024-12-01", "12:00:00")));
    }

    #[test]
    fn test_add_minutes_extends_window() {
        let mut schedule = Schedule::new("Show", hm(18, 0), hm(19, 0));
        let now = at("2024-12-01", "19:10:00");
        assert!(!schedule.check_active(now));

        schedule.add_mins_to_end_time(15);
        assert!(schedule.check_active(now));
        assert_eq!(schedule.next_end_time(now), Some(at("2024-12-01", "19:15:00")));
    }

    #[test]
    fn test_next_end_of_overnight_window() {
        let schedule = Schedule::new("Late", hm(22, 0), hm(2, 0));
        assert_eq!(
            schedule.next_end_time(at("2024-12-01", "23:00:00")),
            Some(at("2024-12-02", "02:00:00"))
        );
        assert_eq!(schedule.next_end_time(at("2024-12-01", "12:00:00")), None);
    }

    #[test]
    fn test_next_start_time() {
        let mut schedule = Schedule::new("Weekend", hm(18, 0), hm(19, 0));
        schedule.days = vec![Weekday::Sat];
        // Sunday 2024-12-01, next Saturday is the 7th
        assert_eq!(
            schedule.next_start_time(at("2024-12-01", "12:00:00")),
            Some(at("2024-12-07", "18:00:00"))
        );
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{"name":"Nightly","startTime":"17:00:00","endTime":"23:00:00","loop":true}"#;
        let schedule: Schedule = serde_json::from_str(json).unwrap();
        assert!(schedule.enabled);
        assert!(schedule.looping);
        assert_eq!(schedule.days.len(), 7);
        assert_eq!(schedule.priority, 0);
    }

    #[test]
    fn test_overlap() {
        let evening = Schedule::new("Evening", hm(17, 0), hm(22, 0));
        let late = Schedule::new("Late", hm(21, 0), hm(1, 0));
        let morning = Schedule::new("Morning", hm(6, 0), hm(9, 0));

        assert!(evening.overlaps(&late));
        assert!(!evening.overlaps(&morning));
        assert!(late.overlaps(&Schedule::new("Small hours", hm(0, 30), hm(2, 0))));

        let mut weekend = morning.clone();
        weekend.days = vec![Weekday::Sat];
        let mut weekday = morning.clone();
        weekday.days = vec![Weekday::Mon];
        assert!(!weekend.overlaps(&weekday));
    }
}
