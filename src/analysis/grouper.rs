//! Day and hour bucketing of lead events.
//!
//! Events whose timestamp is missing or unparseable cannot be assigned a
//! bucket and are skipped silently; callers that need the count use
//! [`count_undated`].

use crate::analysis::normalize::{normalize_collective, source_label};
use crate::analysis::tally::Tally;
use crate::models::Event;
use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Events of one calendar day, tallied by collective and by source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    /// Display label, e.g. `lun, 19/10/2026`.
    pub label: String,
    pub collectives: Tally,
    pub sources: Tally,
}

/// Events of one hour of the current day, tallied by collective.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourGroup {
    pub hour: u32,
    /// Display label, e.g. `09:00`.
    pub label: String,
    pub count: usize,
    pub collectives: Tally,
}

/// Bucket events by local calendar day, in chronological order.
pub fn group_by_day<Tz: TimeZone>(events: &[Event], tz: &Tz) -> Vec<DayGroup> {
    let mut days: BTreeMap<NaiveDate, DayGroup> = BTreeMap::new();
    let mut skipped = 0;

    for event in events {
        let Some(date) = local_date(event, tz) else {
            skipped += 1;
            continue;
        };

        let group = days.entry(date).or_insert_with(|| DayGroup {
            date,
            label: day_label(date),
            collectives: Tally::new(),
            sources: Tally::new(),
        });

        group
            .collectives
            .increment(&normalize_collective(event.colectivo.as_deref()));
        group
            .sources
            .increment(&source_label(event.fuente.as_deref()));
    }

    if skipped > 0 {
        debug!("Skipped {} events without a usable timestamp", skipped);
    }

    days.into_values().collect()
}

/// Bucket today's events into hour-of-day slots.
///
/// Only hours with at least one event are returned, in ascending order.
pub fn group_by_hour_of_today<Tz: TimeZone>(
    events: &[Event],
    tz: &Tz,
    today: NaiveDate,
) -> Vec<HourGroup> {
    let mut slots: Vec<(usize, Tally)> = (0..24).map(|_| (0, Tally::new())).collect();

    for event in events {
        let Some(ts) = event.timestamp() else {
            continue;
        };
        let local = ts.with_timezone(tz);
        if local.date_naive() != today {
            continue;
        }

        let slot = &mut slots[local.hour() as usize];
        slot.0 += 1;
        slot.1
            .increment(&normalize_collective(event.colectivo.as_deref()));
    }

    slots
        .into_iter()
        .enumerate()
        .filter(|(_, (count, _))| *count > 0)
        .map(|(hour, (count, collectives))| HourGroup {
            hour: hour as u32,
            label: format!("{:02}:00", hour),
            count,
            collectives,
        })
        .collect()
}

/// Keep events whose local date lies within `[from, to]`.
///
/// Filtering only applies when both bounds are given; otherwise every
/// event is kept. Undated events never match an active filter.
pub fn filter_by_date_range<Tz: TimeZone>(
    events: &[Event],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    tz: &Tz,
) -> Vec<Event> {
    let (Some(from), Some(to)) = (from, to) else {
        return events.to_vec();
    };

    events
        .iter()
        .filter(|event| {
            local_date(event, tz)
                .map(|date| date >= from && date <= to)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Number of events that cannot be placed in any time bucket.
pub fn count_undated(events: &[Event]) -> usize {
    events.iter().filter(|e| e.timestamp().is_none()).count()
}

/// Display label for a day: abbreviated Spanish weekday plus `dd/mm/yyyy`.
pub fn day_label(date: NaiveDate) -> String {
    format!(
        "{}, {:02}/{:02}/{:04}",
        spanish_weekday_abbrev(date.weekday()),
        date.day(),
        date.month(),
        date.year()
    )
}

fn spanish_weekday_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "lun",
        Weekday::Tue => "mar",
        Weekday::Wed => "mié",
        Weekday::Thu => "jue",
        Weekday::Fri => "vie",
        Weekday::Sat => "sáb",
        Weekday::Sun => "dom",
    }
}

fn local_date<Tz: TimeZone>(event: &Event, tz: &Tz) -> Option<NaiveDate> {
    event
        .timestamp()
        .map(|ts| ts.with_timezone(tz).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn event(colectivo: Option<&str>, fuente: Option<&str>, created_at: &str) -> Event {
        Event {
            id: created_at.to_string(),
            created_at: Some(created_at.to_string()),
            colectivo: colectivo.map(String::from),
            fuente: fuente.map(String::from),
            ..Event::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_label_format() {
        assert_eq!(day_label(date(2026, 10, 19)), "lun, 19/10/2026");
        assert_eq!(day_label(date(2024, 12, 1)), "dom, 01/12/2024");
    }

    #[test]
    fn test_group_by_day_is_chronological() {
        let events = vec![
            event(Some("abogados"), Some("mail.video"), "2024-10-20T09:00:00Z"),
            event(Some("clinicas"), Some("mail.precios"), "2024-10-19T09:00:00Z"),
            event(Some("abogados"), None, "2024-10-20T18:00:00Z"),
        ];

        let days = group_by_day(&events, &Utc);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(2024, 10, 19));
        assert_eq!(days[1].date, date(2024, 10, 20));
        assert_eq!(days[1].collectives.get("Abogados"), 2);
        assert_eq!(days[1].sources.get("Desconocido"), 1);
        assert_eq!(days[1].sources.get("mail.video"), 1);
    }

    #[test]
    fn test_group_by_day_uses_local_calendar() {
        // 23:30 UTC is already the next day at +02:00.
        let events = vec![event(Some("abogados"), None, "2024-10-19T23:30:00Z")];
        let madrid = FixedOffset::east_opt(2 * 3600).unwrap();

        let days = group_by_day(&events, &madrid);
        assert_eq!(days[0].date, date(2024, 10, 20));
    }

    #[test]
    fn test_unparseable_timestamps_are_skipped() {
        let mut broken = event(Some("abogados"), None, "not a date");
        let mut missing = event(Some("abogados"), None, "");
        missing.created_at = None;
        broken.id = "broken".to_string();

        let events = vec![
            broken,
            missing,
            event(Some("abogados"), None, "2024-10-19T10:00:00Z"),
        ];

        let days = group_by_day(&events, &Utc);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].collectives.total(), 1);
        assert_eq!(count_undated(&events), 2);
    }

    #[test]
    fn test_hour_of_today_is_sparse_and_ordered() {
        let today = date(2024, 10, 19);
        let events = vec![
            event(Some("abogados"), None, "2024-10-19T17:10:00Z"),
            event(Some("clinicas"), None, "2024-10-19T09:05:00Z"),
            event(Some("abogados"), None, "2024-10-19T09:55:00Z"),
            event(Some("abogados"), None, "2024-10-18T09:00:00Z"),
        ];

        let hours = group_by_hour_of_today(&events, &Utc, today);
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].hour, 9);
        assert_eq!(hours[0].label, "09:00");
        assert_eq!(hours[0].count, 2);
        assert_eq!(hours[0].collectives.get("Clínicas"), 1);
        assert_eq!(hours[1].hour, 17);
        assert_eq!(hours[1].count, 1);
    }

    #[test]
    fn test_hour_of_today_without_events_is_empty() {
        let events = vec![event(Some("abogados"), None, "2024-10-18T09:00:00Z")];
        let hours = group_by_hour_of_today(&events, &Utc, date(2024, 10, 19));
        assert!(hours.is_empty());
    }

    #[test]
    fn test_filter_by_date_range() {
        let events = vec![
            event(None, None, "2024-10-18T23:59:59Z"),
            event(None, None, "2024-10-19T00:00:00Z"),
            event(None, None, "2024-10-20T23:59:59Z"),
            event(None, None, "2024-10-21T00:00:00Z"),
            event(None, None, "garbage"),
        ];

        let filtered =
            filter_by_date_range(&events, Some(date(2024, 10, 19)), Some(date(2024, 10, 20)), &Utc);
        assert_eq!(filtered.len(), 2);

        // One missing bound disables the filter.
        let unfiltered = filter_by_date_range(&events, Some(date(2024, 10, 19)), None, &Utc);
        assert_eq!(unfiltered.len(), events.len());
    }
}
